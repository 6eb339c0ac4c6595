pub mod pairing;
pub mod participant;
pub mod reminder;
