//! The built-in root model (`concerto@1.0.0`)
//!
//! Declares the five abstract root types every class implicitly extends.
//! Asset and Participant are system-identified; the type index adds
//! `$identifier` to them and `$timestamp` to Transaction and Event.

use super::model_file::ModelFile;
use crate::ast;
use crate::error::Result;
use crate::names::ROOT_NAMESPACE;

fn root_class(name: &str, identified: bool) -> ast::ClassDeclaration {
    ast::ClassDeclaration {
        name: name.to_string(),
        is_abstract: true,
        super_type: None,
        identified: identified.then_some(ast::Identified::System),
        properties: Vec::new(),
        decorators: Vec::new(),
        location: None,
    }
}

/// AST of the root model
pub fn root_model_ast() -> ast::Model {
    let mut model = ast::Model::new(ROOT_NAMESPACE);
    model.declarations = vec![
        ast::Declaration::Concept(root_class("Concept", false)),
        ast::Declaration::Asset(root_class("Asset", true)),
        ast::Declaration::Participant(root_class("Participant", true)),
        ast::Declaration::Transaction(root_class("Transaction", false)),
        ast::Declaration::Event(root_class("Event", false)),
    ];
    model
}

pub fn root_model_file() -> Result<ModelFile> {
    ModelFile::from_ast(root_model_ast(), Some("concerto.cto"), &[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ClassKind, Declaration, Identifier};

    #[test]
    fn test_root_model() {
        let file = root_model_file().unwrap();
        assert_eq!(file.namespace(), ROOT_NAMESPACE);
        assert_eq!(file.declarations().len(), 5);

        match file.declaration("Asset") {
            Some(Declaration::Class(asset)) => {
                assert_eq!(asset.kind, ClassKind::Asset);
                assert!(asset.is_abstract);
                assert_eq!(asset.identified, Some(Identifier::System));
            }
            other => panic!("Expected Asset class, got {:?}", other),
        }
    }
}
