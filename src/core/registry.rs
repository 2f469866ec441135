use crate::domain::model::DatasetDescriptor;
use crate::utils::error::{LakeError, Result};
use std::collections::HashMap;

/// Static mapping from logical dataset name to descriptor, built once at
/// startup. Re-registration under an existing name is rejected.
#[derive(Debug, Default)]
pub struct DescriptorRegistry {
    entries: HashMap<String, DatasetDescriptor>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, descriptor: DatasetDescriptor) -> Result<()> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(LakeError::ConfigError {
                message: format!("dataset '{}' is already registered", name),
            });
        }
        self.entries.insert(name, descriptor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&DatasetDescriptor> {
        self.entries.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&DatasetDescriptor> {
        self.get(name).ok_or_else(|| LakeError::ConfigError {
            message: format!("dataset '{}' is not registered", name),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
