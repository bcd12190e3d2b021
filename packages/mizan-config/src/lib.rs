mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, Extraction, LlmProviderConfig, Panel, Partition, Providers,
	Retrieval, Service, Specialist, Storage, VectorRest,
};

use std::{collections::HashSet, fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.vector.rest_url.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.vector.rest_url must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.max_input_chars == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.max_input_chars must be greater than zero.".to_string(),
		});
	}

	if cfg.partitions.is_empty() {
		return Err(Error::Validation { message: "partitions must be non-empty.".to_string() });
	}

	let mut partition_ids = HashSet::new();

	for partition in &cfg.partitions {
		if partition.id.trim().is_empty() {
			return Err(Error::Validation {
				message: "partitions.id must be non-empty.".to_string(),
			});
		}
		if partition.table.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Partition {} table must be non-empty.", partition.id),
			});
		}
		if partition.display_name.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Partition {} display_name must be non-empty.", partition.id),
			});
		}
		if partition.authority_rank == 0 {
			return Err(Error::Validation {
				message: format!(
					"Partition {} authority_rank must be greater than zero.",
					partition.id
				),
			});
		}
		if !partition_ids.insert(partition.id.as_str()) {
			return Err(Error::Validation {
				message: format!("Partition id {} is declared more than once.", partition.id),
			});
		}
	}

	if cfg.retrieval.match_count == 0 {
		return Err(Error::Validation {
			message: "retrieval.match_count must be greater than zero.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.retrieval.match_threshold) {
		return Err(Error::Validation {
			message: "retrieval.match_threshold must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.retrieval.context_budget == 0 {
		return Err(Error::Validation {
			message: "retrieval.context_budget must be greater than zero.".to_string(),
		});
	}

	if cfg.panel.specialists.is_empty() {
		return Err(Error::Validation {
			message: "panel.specialists must be non-empty.".to_string(),
		});
	}

	let mut specialist_ids = HashSet::new();

	for specialist in &cfg.panel.specialists {
		if specialist.id.trim().is_empty() {
			return Err(Error::Validation {
				message: "panel.specialists.id must be non-empty.".to_string(),
			});
		}
		if !specialist_ids.insert(specialist.id.as_str()) {
			return Err(Error::Validation {
				message: format!("Specialist id {} is declared more than once.", specialist.id),
			});
		}
		if specialist.partitions.is_empty() {
			return Err(Error::Validation {
				message: format!("Specialist {} must query at least one partition.", specialist.id),
			});
		}

		for partition in &specialist.partitions {
			if !partition_ids.contains(partition.as_str()) {
				return Err(Error::Validation {
					message: format!(
						"Specialist {} references unknown partition {partition}.",
						specialist.id
					),
				});
			}
		}
	}

	for (label, cfg) in [
		("guardrail", &cfg.providers.guardrail),
		("synthesis", &cfg.providers.synthesis),
		("specialist", &cfg.providers.specialist),
		("aggregator", &cfg.providers.aggregator),
	] {
		if cfg.api_key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
		if !cfg.temperature.is_finite() || cfg.temperature < 0.0 {
			return Err(Error::Validation {
				message: format!("Provider {label} temperature must be zero or greater."),
			});
		}
		if cfg.max_tokens == 0 {
			return Err(Error::Validation {
				message: format!("Provider {label} max_tokens must be greater than zero."),
			});
		}
		if let Some(format) = cfg.response_format.as_deref()
			&& format != "json_object"
		{
			return Err(Error::Validation {
				message: format!("Provider {label} response_format must be json_object."),
			});
		}
	}

	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for provider in [
		&mut cfg.providers.guardrail,
		&mut cfg.providers.synthesis,
		&mut cfg.providers.specialist,
		&mut cfg.providers.aggregator,
	] {
		if provider.response_format.as_deref().map(|f| f.trim().is_empty()).unwrap_or(false) {
			provider.response_format = None;
		}
	}

	if cfg.storage.vector.rest_url.ends_with('/') {
		let trimmed = cfg.storage.vector.rest_url.trim_end_matches('/').to_string();
		cfg.storage.vector.rest_url = trimmed;
	}
}
