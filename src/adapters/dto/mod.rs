pub mod poi_dto;
pub mod poi_file_row_dto;
pub mod s3_dto;
