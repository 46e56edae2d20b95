//! The pipeline operator: an ordered list of child operations with per-step
//! direction and omission control.
//!
//! Forward evaluation visits steps in declared order; inverse evaluation in
//! reverse order with the roles of each step swapped. A step marked `inv`
//! runs its inverse when the pipeline runs forward, and vice versa;
//! `omit_fwd`/`omit_inv` skip the step in the respective pipeline direction.
//! Step order is significant and never re-sorted.

use log::trace;

use crate::context::Context;
use crate::coord::Coord;
use crate::error::TransformError;
use crate::op::{create, Operation, Params, UnitKind};

/// Declarative description of one pipeline step.
#[derive(Clone, Debug, Default)]
pub struct StepSpec {
    pub name: String,
    pub params: Params,
    /// Swap forward/inverse roles for this step only
    pub reverse: bool,
    /// Skip this step during forward evaluation
    pub omit_fwd: bool,
    /// Skip this step during inverse evaluation
    pub omit_inv: bool,
}

impl StepSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn inv(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn omit_fwd(mut self) -> Self {
        self.omit_fwd = true;
        self
    }

    pub fn omit_inv(mut self) -> Self {
        self.omit_inv = true;
        self
    }
}

/// Split a pre-tokenized pipeline definition into step descriptions.
///
/// Each step is introduced by a `step` marker; within a step, `proj=<name>`
/// names the operation, the modifiers `inv`, `omit_fwd` and `omit_inv` set
/// the per-step flags, and every other `name[=value]` token becomes a typed
/// parameter (numeric values as numbers, other values as text, bare names as
/// flags).
pub fn parse_steps(tokens: &[&str]) -> Result<Vec<StepSpec>, TransformError> {
    let mut specs: Vec<StepSpec> = Vec::new();
    let mut current: Option<StepSpec> = None;

    for &tok in tokens {
        if tok == "step" {
            if let Some(done) = current.take() {
                specs.push(done);
            }
            current = Some(StepSpec::default());
            continue;
        }

        let Some(spec) = current.as_mut() else {
            return Err(TransformError::MalformedPipeline(format!(
                "token '{tok}' before the first step"
            )));
        };

        match tok {
            "inv" => spec.reverse = true,
            "omit_fwd" => spec.omit_fwd = true,
            "omit_inv" => spec.omit_inv = true,
            _ => {
                let params = std::mem::take(&mut spec.params);
                spec.params = match tok.split_once('=') {
                    Some(("proj", name)) => {
                        spec.name = name.to_string();
                        params
                    }
                    Some((key, value)) => match value.parse::<f64>() {
                        Ok(num) => params.number(key, num),
                        Err(_) => params.text(key, value),
                    },
                    None => params.flag(tok),
                };
            }
        }
    }
    if let Some(done) = current.take() {
        specs.push(done);
    }

    for spec in &specs {
        if spec.name.is_empty() {
            return Err(TransformError::MalformedPipeline(
                "step without a proj= operation name".into(),
            ));
        }
    }
    Ok(specs)
}

struct Step {
    op: Box<dyn Operation>,
    reverse: bool,
    omit_fwd: bool,
    omit_inv: bool,
}

impl Step {
    /// Input units when the step runs in its effective forward role.
    fn eff_input(&self) -> UnitKind {
        if self.reverse {
            self.op.output_units()
        } else {
            self.op.input_units()
        }
    }

    fn eff_output(&self) -> UnitKind {
        if self.reverse {
            self.op.input_units()
        } else {
            self.op.output_units()
        }
    }
}

pub struct Pipeline {
    steps: Vec<Step>,
    input: UnitKind,
    output: UnitKind,
    invertible: bool,
}

impl Pipeline {
    /// Build a pipeline from step descriptions.
    ///
    /// Fails on an empty step list, on any child failing to construct, on a
    /// step naming `pipeline` (nesting, detected by name before recursion),
    /// on a step whose effective forward direction cannot run, and when no
    /// step is forward-active or none is inverse-active.
    pub fn new(ctx: &mut Context, specs: &[StepSpec]) -> Result<Self, TransformError> {
        if specs.is_empty() {
            return Err(TransformError::MalformedPipeline(
                "a pipeline needs at least one step".into(),
            ));
        }

        let mut steps = Vec::with_capacity(specs.len());
        for spec in specs {
            if spec.name == "pipeline" {
                return Err(TransformError::MalformedPipeline(
                    "pipelines cannot be nested".into(),
                ));
            }
            let op = create(ctx, &spec.name, &spec.params)?;
            if spec.reverse && !op.has_inverse() {
                return Err(TransformError::MalformedPipeline(format!(
                    "step '{}' is marked inv but has no inverse",
                    spec.name
                )));
            }
            steps.push(Step {
                op,
                reverse: spec.reverse,
                omit_fwd: spec.omit_fwd,
                omit_inv: spec.omit_inv,
            });
        }

        // The pipeline's own unit kinds are derived, not configured: from
        // the first forward-active step and the last inverse-active step
        let input = steps
            .iter()
            .find(|s| !s.omit_fwd)
            .map(Step::eff_input)
            .ok_or_else(|| {
                TransformError::MalformedPipeline("no forward-active steps".into())
            })?;
        let output = steps
            .iter()
            .rev()
            .find(|s| !s.omit_inv)
            .map(Step::eff_output)
            .ok_or_else(|| {
                TransformError::MalformedPipeline("no inverse-active steps".into())
            })?;

        // Adjacent forward-active steps must agree on units where both
        // declare them
        let active: Vec<(usize, &Step)> =
            steps.iter().enumerate().filter(|(_, s)| !s.omit_fwd).collect();
        for pair in active.windows(2) {
            let (i, a) = pair[0];
            let (j, b) = pair[1];
            let out = a.eff_output();
            let inp = b.eff_input();
            if out != UnitKind::Whatever && inp != UnitKind::Whatever && out != inp {
                return Err(TransformError::UnitMismatch(i, j));
            }
        }

        let invertible = steps.iter().all(|s| s.reverse || s.op.has_inverse());

        Ok(Self {
            steps,
            input,
            output,
            invertible,
        })
    }

    /// Build a pipeline from a tokenized `step ...` definition.
    pub fn from_definition(ctx: &mut Context, tokens: &[&str]) -> Result<Self, TransformError> {
        Self::new(ctx, &parse_steps(tokens)?)
    }
}

impl Operation for Pipeline {
    fn name(&self) -> &'static str {
        "pipeline"
    }

    fn forward(&self, mut point: Coord) -> Result<Coord, TransformError> {
        for (i, step) in self.steps.iter().enumerate() {
            if step.omit_fwd {
                continue;
            }
            point = if step.reverse {
                step.op.inverse(point)?
            } else {
                step.op.forward(point)?
            };
            trace!(
                "pipeline fwd step {i} ({}): ({}, {}, {})",
                step.op.name(),
                point.x,
                point.y,
                point.z
            );
        }
        Ok(point)
    }

    fn inverse(&self, mut point: Coord) -> Result<Coord, TransformError> {
        if !self.invertible {
            return Err(TransformError::NoInverse("pipeline"));
        }
        for (i, step) in self.steps.iter().enumerate().rev() {
            if step.omit_inv {
                continue;
            }
            point = if step.reverse {
                step.op.forward(point)?
            } else {
                step.op.inverse(point)?
            };
            trace!(
                "pipeline inv step {i} ({}): ({}, {}, {})",
                step.op.name(),
                point.x,
                point.y,
                point.z
            );
        }
        Ok(point)
    }

    fn has_inverse(&self) -> bool {
        self.invertible
    }

    fn input_units(&self) -> UnitKind {
        self.input
    }

    fn output_units(&self) -> UnitKind {
        self.output
    }
}
