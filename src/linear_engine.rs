use anyhow::{Context, Result, bail};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{Linear, VarBuilder};
use serde::Deserialize;
use std::path::Path;

use crate::engine::{ChurnLabel, Classifier, ClassifierError};
use crate::schema::RequiredColumns;
use crate::table::FeatureFrame;

/// How one required column becomes model inputs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureSpec {
    /// Standardized as `(x - mean) / scale`.
    Numeric {
        column: String,
        #[serde(default)]
        mean: f64,
        #[serde(default = "unit_scale")]
        scale: f64,
    },
    /// One-hot; values outside `categories` encode as all zeros.
    Categorical {
        column: String,
        categories: Vec<String>,
    },
}

fn unit_scale() -> f64 {
    1.0
}

impl FeatureSpec {
    pub fn column(&self) -> &str {
        match self {
            FeatureSpec::Numeric { column, .. } | FeatureSpec::Categorical { column, .. } => column,
        }
    }

    pub fn width(&self) -> usize {
        match self {
            FeatureSpec::Numeric { .. } => 1,
            FeatureSpec::Categorical { categories, .. } => categories.len(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinearModelConfig {
    #[serde(default = "default_num_classes")]
    pub num_classes: usize,
    #[serde(default = "default_churn_class")]
    pub churn_class: u32,
    pub features: Vec<FeatureSpec>,
}

fn default_num_classes() -> usize {
    2
}

fn default_churn_class() -> u32 {
    1
}

impl LinearModelConfig {
    pub fn input_dim(&self) -> usize {
        self.features.iter().map(FeatureSpec::width).sum()
    }

    pub fn validate(&self, required: &RequiredColumns) -> Result<()> {
        if self.num_classes < 2 {
            bail!("num_classes must be at least 2, got {}", self.num_classes);
        }
        if self.churn_class as usize >= self.num_classes {
            bail!(
                "churn_class {} is out of range for {} classes",
                self.churn_class,
                self.num_classes
            );
        }
        if self.features.is_empty() {
            bail!("model declares no features");
        }
        for feature in &self.features {
            if !required.contains(feature.column()) {
                bail!(
                    "feature column '{}' is not in the required column set",
                    feature.column()
                );
            }
            match feature {
                FeatureSpec::Numeric { column, scale, .. } if *scale == 0.0 || !scale.is_finite() => {
                    bail!("feature '{column}' has an unusable scale {scale}");
                }
                FeatureSpec::Categorical { column, categories } if categories.is_empty() => {
                    bail!("categorical feature '{column}' has no categories");
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Linear churn classifier: encoded features, one dense layer, arg-max over classes.
pub struct LinearClassifier {
    model: Linear,
    config: LinearModelConfig,
    device: Device,
}

impl LinearClassifier {
    pub fn new(config: LinearModelConfig, vb: VarBuilder, required: &RequiredColumns) -> Result<Self> {
        config.validate(required)?;
        let device = vb.device().clone();
        let model = candle_nn::linear(config.input_dim(), config.num_classes, vb.pp("classifier"))
            .context("classifier weights do not match the feature encoding")?;
        Ok(Self {
            model,
            config,
            device,
        })
    }

    /// Loads `config.json` and `model.safetensors` from `model_path`.
    #[tracing::instrument(skip_all, fields(model_path = %model_path.display()))]
    pub fn load(model_path: &Path, required: &RequiredColumns) -> Result<Self> {
        if !model_path.is_dir() {
            bail!("Model path {} is not a directory.", model_path.display());
        }

        let config_file = model_path.join("config.json");
        let weights_file = model_path.join("model.safetensors");

        let config = std::fs::read_to_string(&config_file)
            .with_context(|| format!("reading {}", config_file.display()))?;
        let config: LinearModelConfig = serde_json::from_str(&config)
            .with_context(|| format!("parsing {}", config_file.display()))?;

        let device = Device::Cpu;
        let tensors = candle_core::safetensors::load(&weights_file, &device)
            .with_context(|| format!("reading {}", weights_file.display()))?;
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);

        let classifier = Self::new(config, vb, required)?;
        tracing::info!(
            features = classifier.config.features.len(),
            input_dim = classifier.config.input_dim(),
            num_classes = classifier.config.num_classes,
            "Classifier loaded"
        );
        Ok(classifier)
    }

    pub fn config(&self) -> &LinearModelConfig {
        &self.config
    }

    fn encode(&self, frame: &FeatureFrame<'_>) -> Result<Tensor, ClassifierError> {
        let positions = self
            .config
            .features
            .iter()
            .map(|feature| {
                frame
                    .column_index(feature.column())
                    .ok_or_else(|| ClassifierError::UnknownColumn(feature.column().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let input_dim = self.config.input_dim();
        let mut data = Vec::with_capacity(frame.len() * input_dim);

        for (row_index, row) in frame.rows().iter().enumerate() {
            for (feature, &position) in self.config.features.iter().zip(&positions) {
                let cell = row[position];
                match feature {
                    FeatureSpec::Numeric {
                        column,
                        mean,
                        scale,
                    } => {
                        let value = cell
                            .trim()
                            .parse::<f64>()
                            .ok()
                            .filter(|v| v.is_finite())
                            .ok_or_else(|| ClassifierError::InvalidValue {
                                column: column.clone(),
                                row: row_index + 1,
                                value: cell.to_string(),
                            })?;
                        data.push(((value - mean) / scale) as f32);
                    }
                    FeatureSpec::Categorical { categories, .. } => {
                        data.extend(
                            categories
                                .iter()
                                .map(|category| if category == cell { 1f32 } else { 0f32 }),
                        );
                    }
                }
            }
        }

        Ok(Tensor::from_vec(data, (frame.len(), input_dim), &self.device)?)
    }
}

impl Classifier for LinearClassifier {
    #[tracing::instrument(skip(self, frame), fields(rows = frame.len()))]
    fn predict(&self, frame: &FeatureFrame<'_>) -> Result<Vec<ChurnLabel>, ClassifierError> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }

        let inputs = self.encode(frame)?;
        let logits = self.model.forward(&inputs)?;
        let predictions = logits.argmax(1)?.to_vec1::<u32>()?;

        let labels: Vec<ChurnLabel> = predictions
            .into_iter()
            .map(|class| {
                if class == self.config.churn_class {
                    ChurnLabel::Churn
                } else {
                    ChurnLabel::NoChurn
                }
            })
            .collect();

        tracing::debug!(
            churn = labels.iter().filter(|l| l.is_churn()).count(),
            "Inference complete"
        );
        Ok(labels)
    }
}
