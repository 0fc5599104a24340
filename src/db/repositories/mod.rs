mod country;
mod country_batch;

pub use country::{ CountryRepository, COUNT_FUNCTION, COUNT_PROCEDURE };
pub use country_batch::CountryBatchRepository;
