pub mod index;
pub mod socket_guard;
