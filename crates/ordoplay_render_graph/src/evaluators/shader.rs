// SPDX-License-Identifier: MIT OR Apache-2.0
//! Evaluator generating program source text from a material graph.

use crate::evaluation::{CompileError, EvaluateGraph, GraphEvaluator, Operation, OperationKind};
use crate::nodes::{ConversionFn, ConversionRegistry};
use crate::pin::{types, CompiledValue};
use crate::settings::CompilerSettings;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Write};

/// Vertex attributes every generated vertex program reads
const VERTEX_ATTRIBUTES: [&str; 3] = ["a_position", "a_normal", "a_texcoord0"];

/// Program stage being generated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderStage {
    /// Fragment (pixel) program
    #[default]
    Fragment,
    /// Vertex program
    Vertex,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fragment => f.write_str("fragment"),
            Self::Vertex => f.write_str("vertex"),
        }
    }
}

/// Generated program text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramSource {
    /// Material the program belongs to
    pub name: String,
    /// Program stage
    pub stage: ShaderStage,
    /// Full source text
    pub text: String,
}

#[derive(Debug, Clone)]
struct Statement {
    result: Option<String>,
    ty: String,
    body: String,
}

/// Compiles a material graph into [`ProgramSource`]. Single use.
#[derive(Debug)]
pub struct ShaderEvaluator {
    settings: CompilerSettings,
    conversions: ConversionRegistry,
    identifiers: Vec<String>,
    operations: Vec<Option<Operation>>,
    arrays: HashMap<usize, Vec<CompiledValue>>,
    declarations: IndexMap<String, String>,
    samplers: usize,
    statements: Vec<Statement>,
    extracted: bool,
}

impl ShaderEvaluator {
    /// Evaluator with the standard shader conversions
    pub fn new(settings: CompilerSettings) -> Self {
        Self::with_conversions(settings, ConversionRegistry::shader())
    }

    /// Evaluator with a custom conversion table
    pub fn with_conversions(settings: CompilerSettings, conversions: ConversionRegistry) -> Self {
        Self {
            settings,
            conversions,
            identifiers: Vec::new(),
            operations: Vec::new(),
            arrays: HashMap::new(),
            declarations: IndexMap::new(),
            samplers: 0,
            statements: Vec::new(),
            extracted: false,
        }
    }

    /// Program stage being generated
    pub fn stage(&self) -> ShaderStage {
        self.settings.stage
    }

    /// Identifier generated for a value
    pub fn identifier(&self, value: CompiledValue) -> Option<&str> {
        self.identifiers.get(value.index()).map(String::as_str)
    }

    fn operand(&self, operation: &Operation, index: usize) -> String {
        operation
            .operands
            .get(index)
            .and_then(|value| self.identifier(*value))
            .unwrap_or_default()
            .to_string()
    }

    fn operand_list(&self, operation: &Operation) -> String {
        operation
            .operands
            .iter()
            .filter_map(|value| self.identifier(*value))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Prefixed name shared by every symbol of this material
    fn symbol(&self, prefix: char, name: &str) -> String {
        format!("{prefix}_{}_{name}", self.settings.material_name)
    }

    /// Turn one operation into an identifier, a declaration and/or a statement
    fn lower(&mut self, handle: usize, operation: &Operation) -> String {
        let value = format!("v{handle}");
        let ty = operation.result_type.base.clone();

        let body = match &operation.kind {
            OperationKind::Property { name } => {
                let uniform = self.symbol('u', name);
                self.declarations
                    .entry(uniform.clone())
                    .or_insert_with(|| format!("uniform {ty} {uniform};"));
                uniform
            }
            OperationKind::Sampler { name } => {
                let sampler = self.symbol('s', name);
                if !self.declarations.contains_key(&sampler) {
                    let slot = self.samplers;
                    self.samplers += 1;
                    self.declarations
                        .insert(sampler.clone(), format!("SAMPLER2D({sampler}, {slot});"));
                }
                return sampler;
            }
            OperationKind::Varying { name } => return name.clone(),
            OperationKind::Construct => {
                let operand = self.operand(operation, 0);
                match self.input_base(operation, 0).as_deref() {
                    Some(types::VEC2) if ty == types::VEC4 => format!("{ty}({operand}, 0.0, 1.0)"),
                    Some(types::VEC3) if ty == types::VEC4 => format!("{ty}({operand}, 1.0)"),
                    _ => format!("{ty}({operand})"),
                }
            }
            OperationKind::Add => {
                format!("{} + {}", self.operand(operation, 0), self.operand(operation, 1))
            }
            OperationKind::Sample2D => {
                let texture = self.operand(operation, 0);
                let uv = if operation.operands.len() > 1 {
                    self.operand(operation, 1)
                } else {
                    self.settings.texcoord_varying.clone()
                };
                format!("texture2D({texture}, {uv})")
            }
            OperationKind::FragmentColor => {
                self.statements.push(Statement {
                    result: None,
                    ty: String::new(),
                    body: format!("gl_FragColor = {}", self.operand(operation, 0)),
                });
                return String::new();
            }
            other => format!("{}({})", other.name(), self.operand_list(operation)),
        };

        self.statements.push(Statement {
            result: Some(value.clone()),
            ty,
            body,
        });
        value
    }

    fn input_base(&self, operation: &Operation, index: usize) -> Option<String> {
        let value = operation.operands.get(index)?;
        let source = self.operations.get(value.index())?.as_ref()?;
        Some(source.result_type.base.clone())
    }

    fn write_program(&self, out: &mut String) -> fmt::Result {
        let settings = &self.settings;
        match settings.stage {
            ShaderStage::Fragment => writeln!(out, "$input {}", settings.varyings.join(", "))?,
            ShaderStage::Vertex => {
                writeln!(out, "$input {}", VERTEX_ATTRIBUTES.join(", "))?;
                writeln!(out, "$output {}", settings.varyings.join(", "))?;
            }
        }
        writeln!(out)?;

        writeln!(out, "/*")?;
        writeln!(out, " * DON'T CHANGE DIRECTLY")?;
        writeln!(
            out,
            " * This is a {} program generated for material {}",
            settings.stage, settings.material_name
        )?;
        writeln!(out, " */")?;
        writeln!(out)?;

        for include in &settings.includes {
            writeln!(out, "#include \"{include}\"")?;
        }
        if !settings.includes.is_empty() {
            writeln!(out)?;
        }

        for declaration in self.declarations.values() {
            writeln!(out, "{declaration}")?;
        }
        if !self.declarations.is_empty() {
            writeln!(out)?;
        }

        writeln!(out, "void main()")?;
        writeln!(out, "{{")?;
        for statement in &self.statements {
            match &statement.result {
                Some(result) => writeln!(out, "\t{} {result} = {};", statement.ty, statement.body)?,
                None => writeln!(out, "\t{};", statement.body)?,
            }
        }
        writeln!(out, "}}")
    }
}

impl GraphEvaluator for ShaderEvaluator {
    fn add_operation(&mut self, operation: Operation) -> CompiledValue {
        let handle = self.identifiers.len();
        let identifier = self.lower(handle, &operation);
        self.identifiers.push(identifier);
        self.operations.push(Some(operation));
        CompiledValue(handle)
    }

    fn get_operation(&self, value: CompiledValue) -> Option<&Operation> {
        self.operations.get(value.index())?.as_ref()
    }

    fn add_array(&mut self, name: String, members: Vec<CompiledValue>) -> CompiledValue {
        let handle = self.identifiers.len();
        self.identifiers.push(name);
        self.operations.push(None);
        self.arrays.insert(handle, members);
        CompiledValue(handle)
    }

    fn array_members(&self, value: CompiledValue) -> Option<&[CompiledValue]> {
        self.arrays.get(&value.index()).map(Vec::as_slice)
    }

    fn conversion(&self, from: &str, to: &str) -> Option<ConversionFn> {
        self.conversions.get(from, to)
    }
}

impl EvaluateGraph for ShaderEvaluator {
    type Artifact = ProgramSource;

    fn extract(&mut self) -> Result<ProgramSource, CompileError> {
        if self.extracted {
            tracing::error!("Tried to generate a program twice from the same evaluator");
            return Err(CompileError::AlreadyCompiled);
        }
        self.extracted = true;

        let mut text = String::new();
        // Writing into a String never fails
        let _ = self.write_program(&mut text);
        tracing::debug!(
            material = %self.settings.material_name,
            stage = %self.settings.stage,
            statements = self.statements.len(),
            "Generated program source"
        );

        Ok(ProgramSource {
            name: self.settings.material_name.clone(),
            stage: self.settings.stage,
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::node::NodeId;
    use crate::nodes::{
        AddNode, AttributeNode, ConvertNode, MaterialOutputNode, PropertyNode, Sample2DNode,
        SamplerNode,
    };
    use crate::pin::PinType;

    fn link(graph: &mut Graph, from: NodeId, output: usize, to: NodeId, input: usize) {
        let output = graph.node(from).unwrap().output(output).unwrap();
        let input = graph.node(to).unwrap().input(input).unwrap();
        graph.connect(output, input).unwrap();
    }

    fn settings() -> CompilerSettings {
        CompilerSettings {
            material_name: "Mat".to_string(),
            ..CompilerSettings::default()
        }
    }

    #[test]
    fn test_textured_material() {
        let mut graph = Graph::new("material");
        let albedo = graph.add_node(SamplerNode::new("albedo"));
        let sample = graph.add_node(Sample2DNode);
        let tint = graph.add_node(PropertyNode::new("tint", PinType::scalar(types::VEC4)));
        let add = graph.add_node(AddNode::new());
        let output = graph.add_node(MaterialOutputNode);
        link(&mut graph, albedo, 0, sample, 0);
        link(&mut graph, sample, 0, add, 0);
        link(&mut graph, tint, 0, add, 1);
        link(&mut graph, add, 0, output, 0);
        graph.set_terminal_node(output).unwrap();

        let program = ShaderEvaluator::new(settings())
            .evaluate_graph(&mut graph)
            .unwrap();
        let text = &program.text;

        assert_eq!(program.stage, ShaderStage::Fragment);
        assert!(text.starts_with("$input v_normal, v_texcoord\n"));
        assert!(text.contains("#include \"bgfx_shader.sh\"\n"));
        assert!(text.contains("SAMPLER2D(s_Mat_albedo, 0);\n"));
        assert!(text.contains("uniform vec4 u_Mat_tint;\n"));
        assert!(text.contains("\tvec4 v1 = texture2D(s_Mat_albedo, v_texcoord);\n"));
        assert!(text.contains("\tvec4 v2 = u_Mat_tint;\n"));
        assert!(text.contains("\tvec4 v3 = v1 + v2;\n"));
        assert!(text.contains("\tgl_FragColor = v3;\n"));
        assert!(text.contains("void main()\n{\n"));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn test_shared_node_emits_once() {
        let mut graph = Graph::new("diamond");
        let tint = graph.add_node(PropertyNode::new("tint", PinType::scalar(types::VEC4)));
        let add = graph.add_node(AddNode::new());
        let output = graph.add_node(MaterialOutputNode);
        link(&mut graph, tint, 0, add, 0);
        link(&mut graph, tint, 0, add, 1);
        link(&mut graph, add, 0, output, 0);
        graph.set_terminal_node(output).unwrap();

        let text = ShaderEvaluator::new(settings())
            .evaluate_graph(&mut graph)
            .unwrap()
            .text;
        assert_eq!(text.matches("uniform vec4 u_Mat_tint;").count(), 1);
        assert_eq!(text.matches(" = u_Mat_tint;").count(), 1);
        assert!(text.contains("\tvec4 v1 = v0 + v0;\n"));
    }

    #[test]
    fn test_conversions_and_uv_input() {
        let mut graph = Graph::new("convert");
        let strength = graph.add_node(PropertyNode::new("strength", PinType::scalar(types::FLOAT)));
        let widen = graph.add_node(ConvertNode::new(
            PinType::scalar(types::FLOAT),
            PinType::scalar(types::VEC4),
        ));
        let uv = graph.add_node(AttributeNode::new("v_uv1", PinType::scalar(types::VEC2)));
        let albedo = graph.add_node(SamplerNode::new("albedo"));
        let sample = graph.add_node(Sample2DNode);
        let add = graph.add_node(AddNode::new());
        let output = graph.add_node(MaterialOutputNode);
        link(&mut graph, strength, 0, widen, 0);
        link(&mut graph, albedo, 0, sample, 0);
        link(&mut graph, uv, 0, sample, 1);
        link(&mut graph, widen, 0, add, 0);
        link(&mut graph, sample, 0, add, 1);
        link(&mut graph, add, 0, output, 0);
        graph.set_terminal_node(output).unwrap();

        let text = ShaderEvaluator::new(settings())
            .evaluate_graph(&mut graph)
            .unwrap()
            .text;
        assert!(text.contains("uniform float u_Mat_strength;\n"));
        assert!(text.contains("\tvec4 v1 = vec4(v0);\n"));
        assert!(text.contains("texture2D(s_Mat_albedo, v_uv1)"));
    }

    #[test]
    fn test_unsupported_conversion() {
        let mut graph = Graph::new("bad convert");
        let color = graph.add_node(PropertyNode::new("color", PinType::scalar(types::VEC4)));
        let narrow = graph.add_node(ConvertNode::new(
            PinType::scalar(types::VEC4),
            PinType::scalar(types::FLOAT),
        ));
        link(&mut graph, color, 0, narrow, 0);
        graph.set_terminal_node(narrow).unwrap();

        let result = ShaderEvaluator::new(settings()).evaluate_graph(&mut graph);
        assert!(matches!(result, Err(CompileError::UnsupportedConversion { .. })));
    }

    #[test]
    fn test_single_use() {
        let mut graph = Graph::new("single use");
        let color = graph.add_node(PropertyNode::new("color", PinType::scalar(types::VEC4)));
        let output = graph.add_node(MaterialOutputNode);
        link(&mut graph, color, 0, output, 0);
        graph.set_terminal_node(output).unwrap();

        let mut evaluator = ShaderEvaluator::new(settings());
        assert!(evaluator.evaluate_graph(&mut graph).is_ok());
        assert_eq!(evaluator.extract(), Err(CompileError::AlreadyCompiled));
    }

    #[test]
    fn test_vertex_header() {
        let mut evaluator = ShaderEvaluator::new(CompilerSettings {
            stage: ShaderStage::Vertex,
            ..settings()
        });
        let text = evaluator.extract().unwrap().text;
        assert!(text.starts_with("$input a_position, a_normal, a_texcoord0\n$output v_normal, v_texcoord\n"));
        assert!(text.contains("vertex program generated for material Mat"));
    }
}
