//! Archival record formatting. Writing these records to disk (file
//! layout, directory management, EPD emission) stays an external
//! collaborator concern per the distilled spec's non-goals; this module
//! only produces the deterministic text handed off to whatever
//! `config::ArchiveWriter` is configured.

pub mod pgn;
