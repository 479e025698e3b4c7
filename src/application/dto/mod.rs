pub mod poi_dto;
