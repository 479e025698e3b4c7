pub mod poi_repository;
