pub mod favourites;
pub mod health;
pub mod users;
