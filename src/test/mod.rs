mod challenges;
mod db;
mod invitations;
mod routes;
mod utils;

pub use utils::test_utils;
