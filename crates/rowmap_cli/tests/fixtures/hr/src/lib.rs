pub mod crosspkg;
pub mod embed;
