use crate::store::Value;
use smallvec::SmallVec;

/// Arguments of one call, as the caller passed them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: SmallVec<[Value; 4]>,
    pub keywords: SmallVec<[(String, Value); 2]>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self { positional: values.into_iter().map(Into::into).collect(), keywords: SmallVec::new() }
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.push((name.into(), value.into()));
        self
    }

    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keywords.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// The argument for the parameter at `index` named `name`, positional first.
    pub fn get(&self, index: usize, name: &str) -> Option<&Value> {
        self.positional.get(index).or_else(|| self.keyword(name))
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }
}

impl FromIterator<Value> for CallArgs {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        Self { positional: iter.into_iter().collect(), keywords: SmallVec::new() }
    }
}
