pub mod epg_repository;
