pub mod country;

pub use country::{ Country, CountryQuery };
