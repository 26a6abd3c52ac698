pub mod url_template;
pub mod json_path;
pub mod fragment;
pub mod heuristics;
pub mod normalizer;
pub mod grabber;
