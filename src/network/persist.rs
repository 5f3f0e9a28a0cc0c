//! Parameter persistence.
//!
//! Three layouts are supported:
//!
//! - **Raw**: for every layer boundary in order, the weight buffer followed by
//!   the bias buffer as little-endian `f64`, nothing else. The file carries no
//!   shape information, so it can only be read into a network built with the
//!   same architecture, and a mismatch goes unnoticed unless the stream runs
//!   short.
//! - **Binary**: `b"DNNW"`, format version, layer count and layer sizes (all
//!   little-endian `u32`), then the raw blocks. Loading checks the header.
//! - **JSON**: a versioned [`ModelFile`], convenient to inspect by hand.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::activation::activation::ActivationFunction;
use crate::error::{NnError, Result};
use crate::math::matrix::Matrix;
use crate::network::network::Network;

pub const MAGIC: &[u8; 4] = b"DNNW";
pub const FORMAT_VERSION: u32 = 1;

/// Upper bound on the layer count accepted from a binary header.
const MAX_LAYERS: u32 = 4096;

/// Upper bound on the parameter count accepted from a model file (2 GiB of `f64`).
const MAX_PARAMETERS: usize = 1 << 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Raw,
    Binary,
    Json,
}

impl ModelFormat {
    /// `.json` → Json, `.raw` → Raw, anything else → Binary.
    pub fn from_path(path: &Path) -> ModelFormat {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ModelFormat::Json,
            Some(ext) if ext.eq_ignore_ascii_case("raw") => ModelFormat::Raw,
            _ => ModelFormat::Binary,
        }
    }
}

impl FromStr for ModelFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(ModelFormat::Raw),
            "binary" | "bin" => Ok(ModelFormat::Binary),
            "json" => Ok(ModelFormat::Json),
            other => Err(format!("unknown model format '{other}' (expected raw, binary or json)")),
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelFormat::Raw => "raw",
            ModelFormat::Binary => "binary",
            ModelFormat::Json => "json",
        };
        f.write_str(name)
    }
}

/// JSON model layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub format_version: u32,
    pub layer_sizes: Vec<usize>,
    #[serde(default)]
    pub activation: ActivationFunction,
    pub layers: Vec<LayerParameters>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerParameters {
    pub weights: Matrix,
    pub biases: Matrix,
}

impl Network {
    /// Writes the raw parameter blocks with no header.
    pub fn write_raw<W: Write>(&self, writer: &mut W) -> Result<()> {
        for layer in self.layers() {
            write_values(writer, layer.weights().as_slice())?;
            write_values(writer, layer.biases().as_slice())?;
        }
        Ok(())
    }

    /// Reads raw parameter blocks written by [`Network::write_raw`] into this
    /// network. Nothing is modified unless the whole stream reads cleanly.
    pub fn read_raw_into<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let expected = self.parameter_count();
        let mut blocks = Vec::with_capacity(self.layers().len());
        let mut read_so_far = 0;
        for layer in self.layers() {
            let mut weights = vec![0.0; layer.weights().len()];
            let mut biases = vec![0.0; layer.biases().len()];
            read_values(reader, &mut weights, read_so_far, expected)?;
            read_so_far += weights.len();
            read_values(reader, &mut biases, read_so_far, expected)?;
            read_so_far += biases.len();
            blocks.push((weights, biases));
        }

        for (layer, (weights, biases)) in self.layers_mut().iter_mut().zip(blocks) {
            let (w, b) = layer.parameters_mut();
            w.copy_from_slice(&weights);
            b.copy_from_slice(&biases);
        }
        Ok(())
    }

    /// Writes the headered binary format.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(FORMAT_VERSION)?;
        writer.write_u32::<LittleEndian>(header_u32(self.layer_sizes().len(), "layer count")?)?;
        for &size in self.layer_sizes() {
            writer.write_u32::<LittleEndian>(header_u32(size, "layer size")?)?;
        }
        self.write_raw(writer)
    }

    /// Reads the headered binary format into a new network.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Network> {
        let sizes = read_header(reader)?;
        read_parameters(reader, &sizes)
    }

    /// Reads the headered binary format into this network, rejecting files
    /// written for another architecture.
    pub fn read_into<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let sizes = read_header(reader)?;
        if sizes != self.layer_sizes() {
            return Err(NnError::Format(format!(
                "model was saved for layers {:?} but this network has {:?}",
                sizes,
                self.layer_sizes()
            )));
        }
        self.read_raw_into(reader)
    }

    pub fn to_model_file(&self) -> ModelFile {
        ModelFile {
            format_version: FORMAT_VERSION,
            layer_sizes: self.layer_sizes().to_vec(),
            activation: self.activator(),
            layers: self
                .layers()
                .iter()
                .map(|l| LayerParameters {
                    weights: l.weights().clone(),
                    biases: l.biases().clone(),
                })
                .collect(),
        }
    }

    pub fn from_model_file(model: ModelFile) -> Result<Network> {
        if model.format_version != FORMAT_VERSION {
            return Err(NnError::Format(format!(
                "unsupported model format_version {}; expected {}",
                model.format_version, FORMAT_VERSION
            )));
        }
        check_architecture(&model.layer_sizes)?;
        if model.layers.len() != model.layer_sizes.len() - 1 {
            return Err(NnError::Format(format!(
                "{} layer sizes imply {} weight layers, file has {}",
                model.layer_sizes.len(),
                model.layer_sizes.len() - 1,
                model.layers.len()
            )));
        }
        for (i, (params, pair)) in model.layers.iter().zip(model.layer_sizes.windows(2)).enumerate() {
            let (weights, biases) = ((pair[1], pair[0]), (pair[1], 1));
            if params.weights.shape() != weights || params.biases.shape() != biases {
                return Err(NnError::Format(format!(
                    "layer {}: expected weights {:?} and biases {:?}, got {:?} and {:?}",
                    i,
                    weights,
                    biases,
                    params.weights.shape(),
                    params.biases.shape()
                )));
            }
            if params.weights.as_slice().iter().chain(params.biases.as_slice()).any(|x| !x.is_finite()) {
                return Err(NnError::Format(format!("layer {}: non-finite parameter", i)));
            }
        }

        let mut network = Network::zeroed(&model.layer_sizes, model.activation)?;
        for (layer, params) in network.layers_mut().iter_mut().zip(model.layers) {
            let (w, b) = layer.parameters_mut();
            *w = params.weights;
            *b = params.biases;
        }
        Ok(network)
    }

    /// Serializes the network to a pretty-printed JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &self.to_model_file())?;
        Ok(())
    }

    /// Deserializes a network from a JSON file previously written by `save_json`.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Network> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let model: ModelFile = serde_json::from_reader(reader)?;
        Network::from_model_file(model)
    }

    pub fn save_file<P: AsRef<Path>>(&self, path: P, format: ModelFormat) -> Result<()> {
        let path = path.as_ref();
        match format {
            ModelFormat::Json => self.save_json(path)?,
            ModelFormat::Raw | ModelFormat::Binary => {
                let mut writer = BufWriter::new(File::create(path)?);
                if format == ModelFormat::Raw {
                    self.write_raw(&mut writer)?;
                } else {
                    self.write_to(&mut writer)?;
                }
                writer.flush()?;
            }
        }
        debug!(path = %path.display(), %format, "saved model");
        Ok(())
    }

    /// Loads a model file. `layer_sizes` is required for raw files and, when
    /// given, is checked against self-describing formats.
    pub fn load_file<P: AsRef<Path>>(
        path: P,
        format: ModelFormat,
        layer_sizes: Option<&[usize]>,
    ) -> Result<Network> {
        let path = path.as_ref();
        let network = match format {
            ModelFormat::Json => Network::load_json(path)?,
            ModelFormat::Binary => Network::read_from(&mut BufReader::new(File::open(path)?))?,
            ModelFormat::Raw => {
                let sizes = layer_sizes.ok_or_else(|| {
                    NnError::InvalidConfig("raw model files need the layer sizes to be given".to_owned())
                })?;
                read_parameters(&mut BufReader::new(File::open(path)?), sizes)?
            }
        };

        if let Some(sizes) = layer_sizes {
            if sizes != network.layer_sizes() {
                return Err(NnError::Format(format!(
                    "model has layers {:?}, expected {:?}",
                    network.layer_sizes(),
                    sizes
                )));
            }
        }
        debug!(path = %path.display(), %format, layer_sizes = ?network.layer_sizes(), "loaded model");
        Ok(network)
    }
}

fn header_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| NnError::Format(format!("{} {} does not fit in u32", what, value)))
}

fn write_values<W: Write>(writer: &mut W, values: &[f64]) -> Result<()> {
    for &v in values {
        writer.write_f64::<LittleEndian>(v)?;
    }
    Ok(())
}

fn read_values<R: Read>(reader: &mut R, out: &mut [f64], offset: usize, expected: usize) -> Result<()> {
    reader.read_f64_into::<LittleEndian>(out).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            NnError::Format(format!(
                "parameter stream ended early: network needs {} values, stream ran out within values {}..{}",
                expected,
                offset,
                offset + out.len()
            ))
        } else {
            NnError::Io(e)
        }
    })
}

/// Checks that `sizes` describes a buildable network and returns its
/// parameter count.
fn check_architecture(sizes: &[usize]) -> Result<usize> {
    if sizes.len() < 2 {
        return Err(NnError::Format(format!("model needs at least 2 layers, got {}", sizes.len())));
    }
    if let Some(pos) = sizes.iter().position(|&s| s == 0) {
        return Err(NnError::Format(format!("model layer {} has zero neurons", pos)));
    }
    let total = sizes.windows(2).try_fold(0usize, |acc, pair| {
        pair[0]
            .checked_add(1)
            .and_then(|fan_in| fan_in.checked_mul(pair[1]))
            .and_then(|n| acc.checked_add(n))
    });
    match total {
        Some(n) if n <= MAX_PARAMETERS => Ok(n),
        _ => Err(NnError::Format(format!(
            "model layers {:?} exceed {} parameters",
            sizes, MAX_PARAMETERS
        ))),
    }
}

/// Reads the raw parameter blocks for `sizes`. The network is only allocated
/// once the stream has delivered every value.
fn read_parameters<R: Read>(reader: &mut R, sizes: &[usize]) -> Result<Network> {
    let total = check_architecture(sizes)?;
    let mut bytes = Vec::new();
    reader.take((total * 8) as u64).read_to_end(&mut bytes)?;
    if bytes.len() < total * 8 {
        return Err(NnError::Format(format!(
            "parameter stream ended early: network needs {} values, stream holds {}",
            total,
            bytes.len() / 8
        )));
    }
    let mut network = Network::zeroed(sizes, ActivationFunction::Sigmoid)?;
    network.read_raw_into(&mut bytes.as_slice())?;
    Ok(network)
}

fn read_header<R: Read>(reader: &mut R) -> Result<Vec<usize>> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(truncated_header)?;
    if &magic != MAGIC {
        return Err(NnError::Format(format!("bad magic {:?}, expected {:?}", magic, MAGIC)));
    }

    let version = reader.read_u32::<LittleEndian>().map_err(truncated_header)?;
    if version != FORMAT_VERSION {
        return Err(NnError::Format(format!(
            "unsupported format version {}; expected {}",
            version, FORMAT_VERSION
        )));
    }

    let count = reader.read_u32::<LittleEndian>().map_err(truncated_header)?;
    if count > MAX_LAYERS {
        return Err(NnError::Format(format!("implausible layer count {}", count)));
    }
    (0..count)
        .map(|_| {
            reader
                .read_u32::<LittleEndian>()
                .map(|s| s as usize)
                .map_err(truncated_header)
        })
        .collect()
}

fn truncated_header(e: io::Error) -> NnError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        NnError::Format("model header is truncated".to_owned())
    } else {
        NnError::Io(e)
    }
}
