//! # `ResNet` Weights I/O
//!
//! Weights are stored with ``burn``'s named MessagePack file recorder at full
//! precision. The archive has a single top-level key, ``"ResNet"``, holding
//! the topology fingerprint of the saving model and its module record.
//!
//! The recorder appends the ``.mpk`` extension to paths that lack it.

use crate::errors::Result;
use crate::models::resnet::resnet_model::{ResNet, ResNetRecord};
use burn::module::Module;
use burn::prelude::Backend;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Record, Recorder, RecorderError};
use std::path::PathBuf;

#[allow(non_snake_case)]
mod archive {
    use super::*;

    /// The on-disk archive.
    #[derive(Record)]
    pub struct WeightsArchive<B: Backend> {
        pub ResNet: ResNetWeights<B>,
    }

    /// The ``"ResNet"`` entry of a weights archive.
    #[derive(Record)]
    pub struct ResNetWeights<B: Backend> {
        /// The fingerprint of the saving graph.
        pub topology: String,

        /// The module record.
        pub model: ResNetRecord<B>,
    }
}
use archive::{ResNetWeights, WeightsArchive};

fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
}

impl<B: Backend> ResNet<B> {
    /// Save the parameters to `path`.
    ///
    /// # Errors
    ///
    /// [`crate::ResNetError::Weights`] if the archive cannot be written.
    pub fn save_weights<P: Into<PathBuf>>(
        &self,
        path: P,
    ) -> Result<()> {
        let path = path.into();
        let archive = WeightsArchive {
            ResNet: ResNetWeights {
                topology: self.graph().fingerprint(),
                model: self.clone().into_record(),
            },
        };

        Recorder::<B>::record(&recorder(), archive, path.clone())?;
        tracing::info!("{} weights saved to {}", self.graph().version, path.display());
        Ok(())
    }

    /// Load parameters from `path` into this model.
    ///
    /// # Errors
    ///
    /// [`crate::ResNetError::Weights`] if the archive cannot be read, or was
    /// saved from a different topology.
    pub fn load_weights<P: Into<PathBuf>>(
        self,
        path: P,
        device: &B::Device,
    ) -> Result<Self> {
        let path = path.into();
        let archive: WeightsArchive<B> = Recorder::<B>::load(&recorder(), path.clone(), device)?;
        let weights = archive.ResNet;

        let expected = self.graph().fingerprint();
        if weights.topology != expected {
            return Err(RecorderError::Unknown(format!(
                "topology mismatch loading {}: archive has {} tensors, {} expects {}",
                path.display(),
                weights.topology.split(';').count(),
                self.graph().version,
                expected.split(';').count(),
            ))
            .into());
        }

        tracing::info!("{} weights loaded from {}", self.graph().version, path.display());
        Ok(self.load_record(weights.model))
    }
}
