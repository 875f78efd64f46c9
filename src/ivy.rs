pub mod descriptor;
pub mod layout;
