//! Replacement and spy class generation.
//!
//! Turns a target class name plus its [`MockSpec`] into declaration source
//! the sandbox runtime can load. A plain mock occupies the target's own
//! fully-qualified name; a spy lives under `<spy namespace>::<target scope>`
//! and extends the real class.
//!
//! Output layout is fixed: scope header, class line, constants, static
//! properties, instance properties, methods.

pub mod render;

use crate::registry::{CallKind, MockSpec, VarKind};
use ms_common::{ClassName, Result, Value};
use render::{quote, render_value};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Generator for one class's declaration source.
pub struct ClassBodyGenerator<'a> {
    target: &'a ClassName,
    spec: &'a MockSpec,
}

impl<'a> ClassBodyGenerator<'a> {
    pub fn new(target: &'a ClassName, spec: &'a MockSpec) -> Self {
        ClassBodyGenerator { target, spec }
    }

    /// Fully-qualified name the generated class is declared under.
    pub fn output_class(&self) -> Result<ClassName> {
        if self.spec.is_spy {
            self.target.nested_in(&self.spec.spy_namespace)
        } else {
            Ok(self.target.clone())
        }
    }

    /// Render the declaration source.
    pub fn generate(&self) -> Result<String> {
        let output = self.output_class()?;
        let mut src = String::new();

        if !output.scope().is_empty() {
            src.push_str(&format!("scope {};\n\n", output.scope()));
        }

        src.push_str(&format!("class {}", output.simple_name()));
        if self.spec.is_spy {
            src.push_str(&format!(" extends {}", self.target));
        }
        src.push_str(" {\n");

        self.fields(&mut src, "const", VarKind::Const, &self.spec.vars.consts)?;
        self.fields(
            &mut src,
            "static",
            VarKind::StaticProperty,
            &self.spec.vars.static_properties,
        )?;
        self.fields(&mut src, "var", VarKind::Property, &self.spec.vars.properties)?;

        let target = quote(self.target.as_str());
        for (name, method) in &self.spec.methods {
            let modifier = match method.call_kind {
                CallKind::Static => "static ",
                CallKind::Instance => "",
            };
            // Infallible: writing into a String.
            let _ = writeln!(
                src,
                "    {modifier}fn {name}() => forward({target}, {});",
                quote(name)
            );
        }

        src.push_str("}\n");
        Ok(src)
    }

    fn fields(
        &self,
        src: &mut String,
        keyword: &str,
        kind: VarKind,
        fields: &BTreeMap<String, serde_json::Value>,
    ) -> Result<()> {
        for (name, json) in fields {
            let literal = render_value(&Value::from_json(json, name)?, kind, self.target, name)?;
            let _ = writeln!(src, "    {keyword} {name} = {literal};");
        }
        Ok(())
    }
}

/// Convenience wrapper around [`ClassBodyGenerator::generate`].
pub fn generate_class(target: &ClassName, spec: &MockSpec) -> Result<String> {
    ClassBodyGenerator::new(target, spec).generate()
}
