pub mod location;
pub mod vacancy;

pub use location::{Coordinates, Location, NewLocation};
pub use vacancy::{NewVacancy, Vacancy};
