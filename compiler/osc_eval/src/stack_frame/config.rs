//! Stack frame configuration.

use osc_stack::StackBudget;

use crate::MIN_TABLE_CAPACITY;

/// Default maximum call depth.
pub const DEFAULT_MAX_DEPTH: usize = 16_384;

/// Tunables of one [`StackFrame`](super::StackFrame).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameConfig {
    max_depth: usize,
    min_table_capacity: usize,
    stack_budget: StackBudget,
}

impl FrameConfig {
    pub fn builder() -> FrameConfigBuilder {
        FrameConfigBuilder::new()
    }

    /// Deepest nesting of call-gate activations allowed.
    #[inline]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Capacity of a freshly created pooled member table.
    #[inline]
    pub fn min_table_capacity(&self) -> usize {
        self.min_table_capacity
    }

    /// Native stack growth parameters used around every activation.
    #[inline]
    pub fn stack_budget(&self) -> StackBudget {
        self.stack_budget
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        FrameConfig {
            max_depth: DEFAULT_MAX_DEPTH,
            min_table_capacity: MIN_TABLE_CAPACITY,
            stack_budget: StackBudget::default(),
        }
    }
}

/// Builder for [`FrameConfig`].
///
/// ```
/// use osc_eval::FrameConfig;
///
/// let config = FrameConfig::builder().max_depth(200).build();
/// assert_eq!(config.max_depth(), 200);
/// ```
#[derive(Clone, Debug)]
pub struct FrameConfigBuilder {
    config: FrameConfig,
}

impl FrameConfigBuilder {
    pub fn new() -> Self {
        FrameConfigBuilder {
            config: FrameConfig::default(),
        }
    }

    /// Set the maximum call depth. Clamped to at least 1.
    #[must_use]
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.config.max_depth = max_depth.max(1);
        self
    }

    /// Set the capacity of freshly created member tables. Clamped to at
    /// least 1.
    #[must_use]
    pub fn min_table_capacity(mut self, capacity: usize) -> Self {
        self.config.min_table_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn stack_budget(mut self, budget: StackBudget) -> Self {
        self.config.stack_budget = budget;
        self
    }

    pub fn build(self) -> FrameConfig {
        self.config
    }
}

impl Default for FrameConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
