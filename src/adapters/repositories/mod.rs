mod pg_poi_repository;

pub use pg_poi_repository::PgPoiRepository;
