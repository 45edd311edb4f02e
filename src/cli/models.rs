//! Models command - catalog inspection

use clap::Subcommand;

use super::AppContext;
use crate::domain::model::{ModelDefinition, ModelRegistry};

#[derive(Subcommand, Debug, Clone)]
pub enum ModelsCommand {
    /// List registered models
    List {
        /// Only models tagged with this category
        #[arg(long)]
        category: Option<String>,
    },

    /// Show one model definition as JSON
    Show {
        /// Registry key
        key: String,
    },
}

pub async fn run(ctx: AppContext, command: ModelsCommand) -> anyhow::Result<()> {
    match command {
        ModelsCommand::List { category } => {
            print!("{}", format_models(&ctx.registry, category.as_deref()));
            Ok(())
        }
        ModelsCommand::Show { key } => {
            let model = ctx.registry.get(&key)?;
            println!("{}", serde_json::to_string_pretty(model)?);
            Ok(())
        }
    }
}

fn format_models(registry: &ModelRegistry, category: Option<&str>) -> String {
    let models: Vec<&ModelDefinition> = match category {
        Some(category) => registry.list_by_category(category),
        None => registry.models().iter().collect(),
    };

    if models.is_empty() {
        return "No models registered\n".to_string();
    }

    models
        .iter()
        .map(|m| {
            format!(
                "{:<24} {:<12} ${:>7.4} {}\n",
                m.key(),
                m.provider(),
                m.cost_estimate(),
                m.categories().join(",")
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModelRegistry {
        ModelRegistry::with_models(vec![
            ModelDefinition::new("flux-dev", "FLUX.1 dev", "fal", "fal-ai/flux/dev")
                .with_category("generate_image")
                .with_cost_estimate(0.025),
            ModelDefinition::new("kling-2", "Kling 2", "fal", "fal-ai/kling")
                .with_category("image_to_video")
                .with_category("generate_video")
                .with_cost_estimate(0.25),
        ])
        .unwrap()
    }

    #[test]
    fn test_format_models() {
        let registry = registry();

        let all = format_models(&registry, None);
        assert_eq!(all.lines().count(), 2);
        assert!(all.contains("image_to_video,generate_video"));

        let images = format_models(&registry, Some("generate_image"));
        assert_eq!(images.lines().count(), 1);
        assert!(images.starts_with("flux-dev"));

        assert_eq!(format_models(&registry, Some("generate_3d")), "No models registered\n");
    }
}
