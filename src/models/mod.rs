//! Core data models for mysql-backup
//!
//! Artifacts are never persisted on their own: everything a run knows about
//! past backups is decoded from file names.

pub mod artifact;

pub use artifact::{Artifact, BackupKind, DataArtifact, LogArtifact};
