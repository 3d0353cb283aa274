use smartstring::alias::String;
use std::collections::HashMap;

/// Variable store mapping names to 64-bit integers.
///
/// Undefined names read as `0`, which keeps expression evaluation total.
#[derive(Debug, Default)]
pub struct SymTab {
    tab: HashMap<String, i64>,
}

impl SymTab {
    pub fn new() -> Self {
        Self {
            tab: HashMap::new(),
        }
    }

    pub fn set(&mut self, name: impl AsRef<str>, value: i64) {
        self.tab.insert(String::from(name.as_ref()), value);
    }

    pub fn get(&self, name: impl AsRef<str>) -> i64 {
        *self.tab.get(name.as_ref()).unwrap_or(&0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let mut t = SymTab::new();
        t.set("x", 42);
        assert_eq!(t.get("x"), 42);
        t.set("x", -1);
        assert_eq!(t.get("x"), -1);
    }

    #[test]
    fn undefined_reads_as_zero() {
        let t = SymTab::new();
        assert_eq!(t.get("missing"), 0);
    }
}
