//! Wire paths of the form `$.owner.addresses[0].city`

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => write!(f, ".{}", name),
            PathSegment::Index(i) => write!(f, "[{}]", i),
        }
    }
}

/// Location of a value inside a wire tree, rooted at `$`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WirePath {
    segments: Vec<PathSegment>,
}

impl WirePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn field(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.segments.push(PathSegment::Field(name.to_string()));
        next
    }

    pub fn index(&self, i: usize) -> Self {
        let mut next = self.clone();
        next.segments.push(PathSegment::Index(i));
        next
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }
}

impl fmt::Display for WirePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.segments {
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_display() {
        let path = WirePath::root().field("owner").field("addresses").index(0).field("city");
        assert_eq!(path.to_string(), "$.owner.addresses[0].city");
        assert_eq!(WirePath::root().to_string(), "$");
    }
}
