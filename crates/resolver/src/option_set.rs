use cascade_protocol::{LookupOption, LookupResponse};

/// Candidate matches returned by one lookup. Never mutated after creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    options: Vec<LookupOption>,
}

impl OptionSet {
    pub fn new(options: Vec<LookupOption>) -> Self {
        Self { options }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LookupOption> {
        self.options.iter()
    }

    pub fn as_slice(&self) -> &[LookupOption] {
        &self.options
    }

    /// The only option, if there is exactly one.
    pub fn into_unique(self) -> Option<LookupOption> {
        let mut options = self.options;
        if options.len() == 1 {
            options.pop()
        } else {
            None
        }
    }
}

impl From<LookupResponse> for OptionSet {
    fn from(response: LookupResponse) -> Self {
        Self::new(response.results)
    }
}

impl From<Vec<LookupOption>> for OptionSet {
    fn from(options: Vec<LookupOption>) -> Self {
        Self::new(options)
    }
}

impl FromIterator<LookupOption> for OptionSet {
    fn from_iter<T: IntoIterator<Item = LookupOption>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
