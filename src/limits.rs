//! Limits and constraints for document and schema processing
//!
//! This module defines limits that keep a single analysis bounded:
//! oversized buffers, runaway nesting and schemas that include each
//! other too deeply are rejected or truncated instead of exhausting memory.

use crate::error::{Error, Result};

/// Global limits configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum element nesting depth tracked by the tree builder
    pub max_xml_depth: usize,

    /// Maximum document or schema size in bytes
    pub max_xml_size: usize,

    /// Maximum include/externalRef nesting while loading a schema
    pub max_schema_depth: usize,

    /// Maximum number of pattern nodes in one schema
    pub max_defines: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_xml_depth: 1000,
            max_xml_size: 100 * 1024 * 1024, // 100 MB
            max_schema_depth: 64,
            max_defines: 1_000_000,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_xml_depth: 100,
            max_xml_size: 10 * 1024 * 1024, // 10 MB
            max_schema_depth: 16,
            max_defines: 100_000,
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_xml_depth: 10000,
            max_xml_size: 1024 * 1024 * 1024, // 1 GB
            max_schema_depth: 1000,
            max_defines: 10_000_000,
        }
    }

    /// Set the maximum element depth
    pub fn with_max_xml_depth(mut self, depth: usize) -> Self {
        self.max_xml_depth = depth;
        self
    }

    /// Set the maximum include/externalRef nesting
    pub fn with_max_schema_depth(mut self, depth: usize) -> Self {
        self.max_schema_depth = depth;
        self
    }

    /// Check if XML depth is within limits
    pub fn check_xml_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_xml_depth {
            Err(Error::LimitExceeded(format!(
                "XML depth {} exceeds maximum {}",
                depth, self.max_xml_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if XML size is within limits
    pub fn check_xml_size(&self, size: usize) -> Result<()> {
        if size > self.max_xml_size {
            Err(Error::LimitExceeded(format!(
                "XML size {} bytes exceeds maximum {} bytes",
                size, self.max_xml_size
            )))
        } else {
            Ok(())
        }
    }

    /// Check if schema include depth is within limits
    pub fn check_schema_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_schema_depth {
            Err(Error::LimitExceeded(format!(
                "Schema depth {} exceeds maximum {}",
                depth, self.max_schema_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if the number of pattern nodes is within limits
    pub fn check_defines(&self, count: usize) -> Result<()> {
        if count > self.max_defines {
            Err(Error::LimitExceeded(format!(
                "Define count {} exceeds maximum {}",
                count, self.max_defines
            )))
        } else {
            Ok(())
        }
    }
}
