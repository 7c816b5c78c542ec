//! Named histogram counters accumulated over a report run.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Value counted by a counter: numbers sort before text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum CounterKey {
    Int(i64),
    Text(String),
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterKey::Int(v) => f.pad(&v.to_string()),
            CounterKey::Text(s) => f.pad(s),
        }
    }
}

macro_rules! int_key {
    ($($t:ty),*) => {
        $(impl From<$t> for CounterKey {
            fn from(value: $t) -> Self {
                CounterKey::Int(value as i64)
            }
        })*
    };
}

int_key!(u8, u16, u32, u64, usize, i32, i64);

impl From<&str> for CounterKey {
    fn from(value: &str) -> Self {
        CounterKey::Text(value.to_string())
    }
}

impl From<String> for CounterKey {
    fn from(value: String) -> Self {
        CounterKey::Text(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Counter {
    pub name: String,
    pub values: BTreeMap<CounterKey, u64>,
}

impl Counter {
    pub fn total(&self) -> u64 {
        self.values.values().sum()
    }
}

/// Counters in declaration order. Passed into a report run and handed back,
/// so callers can accumulate over several runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    counters: Vec<Counter>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a counter so it is shown even when nothing was counted.
    pub fn add(&mut self, name: &str) {
        self.counter_mut(name);
    }

    pub fn count(&mut self, name: &str, key: impl Into<CounterKey>) {
        *self.counter_mut(name).values.entry(key.into()).or_insert(0) += 1;
    }

    pub fn get(&self, name: &str) -> Option<&Counter> {
        self.counters.iter().find(|c| c.name == name)
    }

    /// Occurrences of `key` in counter `name`.
    pub fn value(&self, name: &str, key: impl Into<CounterKey>) -> u64 {
        let key = key.into();
        self.get(name)
            .and_then(|c| c.values.get(&key).copied())
            .unwrap_or(0)
    }

    /// Clear counted values, keeping the declared names.
    pub fn reset(&mut self) {
        for counter in &mut self.counters {
            counter.values.clear();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counters.iter().all(|c| c.values.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Counter> {
        self.counters.iter()
    }

    fn counter_mut(&mut self, name: &str) -> &mut Counter {
        let index = match self.counters.iter().position(|c| c.name == name) {
            Some(index) => index,
            None => {
                self.counters.push(Counter {
                    name: name.to_string(),
                    values: BTreeMap::new(),
                });
                self.counters.len() - 1
            }
        };
        &mut self.counters[index]
    }

    pub fn show(&self, out: &mut impl fmt::Write) -> fmt::Result {
        for counter in &self.counters {
            writeln!(out, "{} (total {})", counter.name, counter.total())?;
            for (key, count) in &counter.values {
                writeln!(out, "  {key:>10}: {count}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.show(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_and_show() {
        let mut counters = Counters::new();
        counters.add("template");
        counters.add("unused");
        counters.count("template", 0u16);
        counters.count("template", 0u16);
        counters.count("template", 8u16);

        assert_eq!(counters.value("template", 0u16), 2);
        assert_eq!(counters.get("template").unwrap().total(), 3);

        let text = counters.to_string();
        assert!(text.starts_with("template (total 3)\n"));
        assert!(text.contains("         0: 2\n"));
        assert!(text.contains("unused (total 0)\n"));
    }

    #[test]
    fn test_reset_keeps_names() {
        let mut counters = Counters::new();
        counters.count("scanModeDifference", "a.grib2");
        counters.reset();
        assert!(counters.is_empty());
        assert!(counters.get("scanModeDifference").is_some());
    }

    #[test]
    fn test_numbers_sort_before_text() {
        let mut counters = Counters::new();
        counters.count("mixed", "x");
        counters.count("mixed", 5u8);
        let keys: Vec<_> = counters.get("mixed").unwrap().values.keys().cloned().collect();
        assert_eq!(keys, vec![CounterKey::Int(5), CounterKey::Text("x".into())]);
    }
}
