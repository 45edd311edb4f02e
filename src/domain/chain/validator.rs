//! Static chain validation against the model registry

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::entity::{Chain, ChainEntry, StepSpec};
use super::error::{ConfigError, Violation};
use super::namespace::INPUT_KEY;
use crate::domain::model::ModelRegistry;

/// Step names must be usable as interpolation token roots
static STEP_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// Where a step name was first declared
#[derive(Debug, Clone, Copy)]
struct Declaration {
    entry: usize,
    enabled: bool,
}

/// Checks a chain before anything runs, collecting every violation
pub struct ChainValidator<'a> {
    registry: &'a ModelRegistry,
}

impl<'a> ChainValidator<'a> {
    pub fn new(registry: &'a ModelRegistry) -> Self {
        Self { registry }
    }

    pub fn validate(&self, chain: &Chain) -> Result<(), ConfigError> {
        let mut violations = Vec::new();

        if chain.is_empty() {
            violations.push(Violation::EmptyChain);
        }

        let declarations = self.check_names(chain, &mut violations);

        for (entry_index, entry) in chain.entries().iter().enumerate() {
            if let ChainEntry::Parallel(group) = entry {
                if group.is_empty() {
                    violations.push(Violation::EmptyGroup { entry: entry_index });
                }
            }

            for step in entry.steps().iter().filter(|s| s.is_enabled()) {
                self.check_model(step, &mut violations);
                check_references(step, entry_index, &declarations, &mut violations);
            }
        }

        if violations.is_empty() {
            debug!(chain = %chain.name(), steps = chain.step_count(), "Chain is valid");
            Ok(())
        } else {
            debug!(chain = %chain.name(), violations = violations.len(), "Chain is invalid");
            Err(ConfigError::new(chain.name(), violations))
        }
    }

    fn check_names<'c>(
        &self,
        chain: &'c Chain,
        violations: &mut Vec<Violation>,
    ) -> HashMap<&'c str, Declaration> {
        let mut declarations = HashMap::new();

        for (entry_index, entry) in chain.entries().iter().enumerate() {
            for step in entry.steps() {
                let name = step.name();

                if name == INPUT_KEY {
                    violations.push(Violation::ReservedStepName {
                        step: name.to_string(),
                    });
                } else if !STEP_NAME_PATTERN.is_match(name) {
                    violations.push(Violation::InvalidStepName {
                        step: name.to_string(),
                    });
                }

                if declarations.contains_key(name) {
                    violations.push(Violation::DuplicateStepName {
                        step: name.to_string(),
                    });
                } else {
                    declarations.insert(
                        name,
                        Declaration {
                            entry: entry_index,
                            enabled: step.is_enabled(),
                        },
                    );
                }
            }
        }

        declarations
    }

    fn check_model(&self, step: &StepSpec, violations: &mut Vec<Violation>) {
        let known_type = self.registry.has_category(step.step_type());

        if !known_type {
            violations.push(Violation::UnknownStepType {
                step: step.name().to_string(),
                step_type: step.step_type().to_string(),
            });
        }

        let Some(key) = step.model() else {
            return;
        };

        match self.registry.get(key) {
            Err(error) => violations.push(Violation::UnknownModel {
                step: step.name().to_string(),
                error,
            }),
            Ok(model) if known_type && !model.has_category(step.step_type()) => {
                violations.push(Violation::IncompatibleModel {
                    step: step.name().to_string(),
                    model: key.to_string(),
                    step_type: step.step_type().to_string(),
                })
            }
            Ok(_) => {}
        }
    }
}

fn check_references(
    step: &StepSpec,
    entry_index: usize,
    declarations: &HashMap<&str, Declaration>,
    violations: &mut Vec<Violation>,
) {
    let mut seen = HashSet::new();

    for (reference, via) in step.references() {
        if !seen.insert((reference.clone(), via)) {
            continue;
        }

        let violation = match declarations.get(reference.as_str()) {
            None => Violation::UnknownReference {
                step: step.name().to_string(),
                reference,
                via,
            },
            // Same entry covers self and intra-group references
            Some(declared) if declared.entry >= entry_index => Violation::ForwardReference {
                step: step.name().to_string(),
                reference,
                via,
            },
            Some(declared) if !declared.enabled => Violation::DisabledReference {
                step: step.name().to_string(),
                reference,
                via,
            },
            Some(_) => continue,
        };

        violations.push(violation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chain::ReferenceKind;
    use crate::domain::model::{ModelDefinition, RegistryError};
    use serde_json::json;

    fn registry() -> ModelRegistry {
        ModelRegistry::with_models(vec![
            ModelDefinition::new("flux-dev", "FLUX.1 dev", "fal", "fal-ai/flux/dev")
                .with_category("generate_image"),
            ModelDefinition::new("kling-2", "Kling 2", "fal", "fal-ai/kling")
                .with_category("generate_video")
                .with_category("image_to_video"),
            ModelDefinition::new("mmaudio", "MMAudio", "fal", "fal-ai/mmaudio")
                .with_category("generate_audio"),
        ])
        .unwrap()
    }

    fn validate(chain: &Chain) -> Result<(), ConfigError> {
        let registry = registry();
        ChainValidator::new(&registry).validate(chain)
    }

    #[test]
    fn test_valid_chain() {
        let chain = Chain::new("promo")
            .with_step(
                StepSpec::new("img", "generate_image")
                    .with_model("flux-dev")
                    .with_parameter("prompt", json!("{{input}}")),
            )
            .with_parallel(vec![
                StepSpec::new("vid", "image_to_video").with_input_from("img"),
                StepSpec::new("music", "generate_audio")
                    .with_parameter("prompt", json!("music for {{img.output}}")),
            ]);

        assert!(validate(&chain).is_ok());
    }

    #[test]
    fn test_reports_every_violation() {
        let chain = Chain::new("broken")
            .with_step(StepSpec::new("a", "generate_image"))
            .with_step(StepSpec::new("b", "generate_image").with_model("dalle-9"))
            .with_step(StepSpec::new("c", "generate_video"))
            .with_step(StepSpec::new("d", "generate_audio"))
            .with_step(StepSpec::new("e", "image_to_video").with_input_from("missing"));

        let err = validate(&chain).unwrap_err();

        assert_eq!(err.violations().len(), 2);
        assert!(matches!(
            &err.violations()[0],
            Violation::UnknownModel { step, error: RegistryError::UnknownModel { key, available } }
                if step == "b" && key == "dalle-9" && available.len() == 3
        ));
        assert_eq!(
            err.violations()[1],
            Violation::UnknownReference {
                step: "e".to_string(),
                reference: "missing".to_string(),
                via: ReferenceKind::InputFrom,
            }
        );
    }

    #[test]
    fn test_unknown_type_and_incompatible_model() {
        let chain = Chain::new("types")
            .with_step(StepSpec::new("a", "generate_3d"))
            .with_step(StepSpec::new("b", "generate_video").with_model("flux-dev"));

        let err = validate(&chain).unwrap_err();

        assert_eq!(
            err.violations(),
            &[
                Violation::UnknownStepType {
                    step: "a".to_string(),
                    step_type: "generate_3d".to_string(),
                },
                Violation::IncompatibleModel {
                    step: "b".to_string(),
                    model: "flux-dev".to_string(),
                    step_type: "generate_video".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_forward_and_intra_group_references() {
        let chain = Chain::new("order")
            .with_step(StepSpec::new("vid", "image_to_video").with_input_from("img"))
            .with_step(StepSpec::new("img", "generate_image"))
            .with_parallel(vec![
                StepSpec::new("a", "generate_audio"),
                StepSpec::new("b", "generate_audio")
                    .with_parameter("prompt", json!("{{a.output}}")),
            ]);

        let err = validate(&chain).unwrap_err();

        assert_eq!(
            err.violations(),
            &[
                Violation::ForwardReference {
                    step: "vid".to_string(),
                    reference: "img".to_string(),
                    via: ReferenceKind::InputFrom,
                },
                Violation::ForwardReference {
                    step: "b".to_string(),
                    reference: "a".to_string(),
                    via: ReferenceKind::Token,
                },
            ]
        );
    }

    #[test]
    fn test_self_reference_is_forward() {
        let chain = Chain::new("self")
            .with_step(StepSpec::new("img", "generate_image").with_input_from("img"));

        let err = validate(&chain).unwrap_err();
        assert!(matches!(err.violations()[0], Violation::ForwardReference { .. }));
    }

    #[test]
    fn test_disabled_reference_and_disabled_steps_unchecked() {
        let chain = Chain::new("disabled")
            .with_step(StepSpec::new("img", "generate_image").with_enabled(false))
            .with_step(StepSpec::new("vid", "image_to_video").with_input_from("img"))
            .with_step(
                StepSpec::new("ghost", "generate_3d")
                    .with_model("nope")
                    .with_enabled(false),
            );

        let err = validate(&chain).unwrap_err();

        assert_eq!(
            err.violations(),
            &[Violation::DisabledReference {
                step: "vid".to_string(),
                reference: "img".to_string(),
                via: ReferenceKind::InputFrom,
            }]
        );
    }

    #[test]
    fn test_names_duplicate_reserved_invalid() {
        let chain = Chain::new("names")
            .with_step(StepSpec::new("img", "generate_image"))
            .with_parallel(vec![
                StepSpec::new("img", "generate_image"),
                StepSpec::new("input", "generate_audio"),
                StepSpec::new("has space", "generate_audio"),
            ]);

        let err = validate(&chain).unwrap_err();

        assert_eq!(
            err.violations(),
            &[
                Violation::DuplicateStepName {
                    step: "img".to_string()
                },
                Violation::ReservedStepName {
                    step: "input".to_string()
                },
                Violation::InvalidStepName {
                    step: "has space".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_empty_chain_and_group() {
        let err = validate(&Chain::new("empty")).unwrap_err();
        assert_eq!(err.violations(), &[Violation::EmptyChain]);

        let chain = Chain::new("group")
            .with_step(StepSpec::new("img", "generate_image"))
            .with_parallel(vec![]);
        let err = validate(&chain).unwrap_err();
        assert_eq!(err.violations(), &[Violation::EmptyGroup { entry: 1 }]);
    }

    #[test]
    fn test_unknown_token_reference() {
        let chain = Chain::new("tokens").with_step(
            StepSpec::new("img", "generate_image")
                .with_parameter("prompt", json!("{{input}} in style of {{style}}")),
        );

        let err = validate(&chain).unwrap_err();

        assert_eq!(
            err.violations(),
            &[Violation::UnknownReference {
                step: "img".to_string(),
                reference: "style".to_string(),
                via: ReferenceKind::Token,
            }]
        );
    }
}
