//! Network topology as plain data.
//!
//! The research models are described here as configuration records — ordered
//! layer specs plus training hyperparameters — for the external tensor
//! framework to interpret. Nothing in this crate executes them; they exist
//! so the topology and hyperparameters travel with the data pipeline instead
//! of living in framework-specific builder calls.
//!
//! Two presets are provided: [`NetworkSpec::frame_cnn`], the per-frame
//! convolutional classifier, and [`NetworkSpec::lrcn`], the convolutional +
//! recurrent sequence classifier, both carrying the hyperparameters the
//! original experiments trained with.

/// Activation functions the presets use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Activation {
    /// Rectified linear unit.
    Relu,
    /// Soft-sign, used by the recurrent layer.
    Softsign,
    /// Softmax over categories, used by output layers.
    Softmax,
}

/// Loss functions the presets use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Loss {
    /// Negative log likelihood.
    NegativeLogLikelihood,
    /// Multi-class cross entropy (time-distributed outputs).
    MultiClassCrossEntropy,
}

/// One layer of a network topology.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum LayerSpec {
    /// 2D convolution.
    Convolution {
        /// Layer name for diagnostics.
        name: &'static str,
        /// Kernel size (rows, columns).
        kernel: (u32, u32),
        /// Stride (rows, columns).
        stride: (u32, u32),
        /// Number of output filters.
        filters: u32,
        /// Activation applied after the convolution.
        activation: Activation,
    },
    /// Max pooling.
    MaxPooling {
        /// Kernel size (rows, columns).
        kernel: (u32, u32),
        /// Stride (rows, columns).
        stride: (u32, u32),
    },
    /// Fully connected layer.
    Dense {
        /// Layer name for diagnostics.
        name: &'static str,
        /// Number of units.
        units: u32,
        /// Activation applied to the output.
        activation: Activation,
    },
    /// Long short-term memory recurrent layer.
    Lstm {
        /// Number of units.
        units: u32,
        /// Activation applied to the output.
        activation: Activation,
    },
    /// Classification output layer (optionally time-distributed).
    Output {
        /// Number of categories.
        categories: u32,
        /// Output activation.
        activation: Activation,
        /// Training loss.
        loss: Loss,
        /// `true` for a per-timestep (recurrent) output.
        recurrent: bool,
    },
}

/// The input shape a network consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputShape {
    /// Frame height in pixels.
    pub rows: u32,
    /// Frame width in pixels.
    pub columns: u32,
    /// Channels per pixel (3 for BGR frames).
    pub channels: u32,
    /// Sequence length for recurrent models; `None` for per-frame models.
    pub frames: Option<u32>,
}

/// Training hyperparameters attached to a topology.
#[derive(Debug, Clone, PartialEq)]
pub struct Hyperparameters {
    /// Learning rate.
    pub learning_rate: f64,
    /// Nesterov / RMSProp momentum term.
    pub momentum: f64,
    /// L2 regularization coefficient.
    pub l2: f64,
    /// Random seed for weight initialization, if the experiment fixed one.
    pub seed: Option<u64>,
    /// Truncated-backprop window for recurrent models.
    pub truncated_bptt_length: Option<u32>,
}

/// A complete plain-data network description.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSpec {
    /// Human-readable model name.
    pub name: &'static str,
    /// Input shape.
    pub input: InputShape,
    /// Ordered layers.
    pub layers: Vec<LayerSpec>,
    /// Training hyperparameters.
    pub hyperparameters: Hyperparameters,
}

impl NetworkSpec {
    /// The per-frame convolutional classifier preset.
    ///
    /// Two convolutions with aggressive strides, one pooling stage, one
    /// dense layer, softmax output. Built to be fast rather than deep.
    pub fn frame_cnn(rows: u32, columns: u32, categories: u32) -> Self {
        Self {
            name: "frame-cnn",
            input: InputShape {
                rows,
                columns,
                channels: 3,
                frames: None,
            },
            layers: vec![
                LayerSpec::Convolution {
                    name: "conv1",
                    kernel: (14, 14),
                    stride: (7, 7),
                    filters: 32,
                    activation: Activation::Relu,
                },
                LayerSpec::MaxPooling {
                    kernel: (3, 3),
                    stride: (2, 2),
                },
                LayerSpec::Convolution {
                    name: "conv2",
                    kernel: (3, 3),
                    stride: (2, 2),
                    filters: 64,
                    activation: Activation::Relu,
                },
                LayerSpec::Dense {
                    name: "fc1",
                    units: 256,
                    activation: Activation::Relu,
                },
                LayerSpec::Output {
                    categories,
                    activation: Activation::Softmax,
                    loss: Loss::NegativeLogLikelihood,
                    recurrent: false,
                },
            ],
            hyperparameters: Hyperparameters {
                learning_rate: 0.001,
                momentum: 0.9,
                l2: 0.0005,
                seed: None,
                truncated_bptt_length: None,
            },
        }
    }

    /// The LRCN-style sequence classifier preset: the frame-CNN front end
    /// feeding an LSTM with a per-timestep softmax output.
    pub fn lrcn(rows: u32, columns: u32, categories: u32, frames: u32) -> Self {
        Self {
            name: "lrcn",
            input: InputShape {
                rows,
                columns,
                channels: 3,
                frames: Some(frames),
            },
            layers: vec![
                LayerSpec::Convolution {
                    name: "conv1",
                    kernel: (14, 14),
                    stride: (7, 7),
                    filters: 32,
                    activation: Activation::Relu,
                },
                LayerSpec::MaxPooling {
                    kernel: (3, 3),
                    stride: (2, 2),
                },
                LayerSpec::Convolution {
                    name: "conv2",
                    kernel: (3, 3),
                    stride: (2, 2),
                    filters: 64,
                    activation: Activation::Relu,
                },
                LayerSpec::Dense {
                    name: "fc1",
                    units: 128,
                    activation: Activation::Relu,
                },
                LayerSpec::Lstm {
                    units: 64,
                    activation: Activation::Softsign,
                },
                LayerSpec::Output {
                    categories,
                    activation: Activation::Softmax,
                    loss: Loss::MultiClassCrossEntropy,
                    recurrent: true,
                },
            ],
            hyperparameters: Hyperparameters {
                learning_rate: 0.001,
                momentum: 0.9,
                l2: 0.001,
                seed: Some(23_432_445),
                truncated_bptt_length: Some(frames / 5),
            },
        }
    }
}
