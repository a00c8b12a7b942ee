pub mod dust;
