//! Menulens: scan a photographed restaurant menu, rebuild its structure,
//! and explain every dish.
//!
//! The pipeline: [`ocr`] extracts raw text and token geometry from the
//! image, [`layout`] clusters tokens into ordered lines with font tiers,
//! [`segmenter`] classifies lines into the section/dish tree, and
//! [`enrichment`] attaches a plain-language explanation to each dish from
//! the persisted cache or the generation collaborator. [`quota`] meters
//! scans per owner and tier, and [`scan`] composes the whole request
//! lifecycle. The HTTP surface lives in [`api`].

pub mod api;
pub mod config;
pub mod db;
pub mod enrichment;
pub mod error;
pub mod layout;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod quota;
pub mod scan;
pub mod segmenter;
