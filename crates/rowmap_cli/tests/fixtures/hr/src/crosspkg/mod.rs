pub mod executive;
pub mod executive_enhanced;
