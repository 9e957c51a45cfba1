//! Card protocol drivers
//!
//! `sdmmc` holds the SD/MMC command layer shared by memory and I/O cards,
//! `sdio` the I/O function transport built on top of it.

pub mod sdio;
pub mod sdmmc;
