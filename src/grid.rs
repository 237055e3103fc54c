//! Named-axis gridded arrays
//!
//! This module defines the [`Grid`] type used throughout the library: an
//! N-dimensional `f64` array whose axes carry names (a subset of
//! `ensemble_member`, a time grouping, `lat`, `lon`) and optional named
//! coordinates. The `lat` axis carries latitudes in degrees, which drive
//! area weighting; grouping axes carry integer keys; the ensemble axis
//! carries member labels. Missing values are `f64::NAN` and propagate
//! through reductions.

use crate::errors::{EnsSigError, Result};
use ndarray::{ArrayD, Axis};
use std::collections::BTreeMap;

/// Values attached to a coordinate
#[derive(Debug, Clone, PartialEq)]
pub enum CoordValues {
    /// Continuous coordinate, e.g. latitude in degrees
    Float(Vec<f64>),
    /// Grouping keys, e.g. month numbers or years
    Int(Vec<i64>),
    /// Free-form labels, e.g. ensemble member names
    Label(Vec<String>),
}

impl CoordValues {
    /// Number of values along the coordinate's axis
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            CoordValues::Float(v) => v.len(),
            CoordValues::Int(v) => v.len(),
            CoordValues::Label(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn subset(&self, indices: &[usize]) -> CoordValues {
        match self {
            CoordValues::Float(v) => {
                CoordValues::Float(indices.iter().map(|&i| v[i]).collect())
            }
            CoordValues::Int(v) => CoordValues::Int(indices.iter().map(|&i| v[i]).collect()),
            CoordValues::Label(v) => {
                CoordValues::Label(indices.iter().map(|&i| v[i].clone()).collect())
            }
        }
    }
}

/// A named coordinate lying along one axis of a grid
#[derive(Debug, Clone, PartialEq)]
pub struct Coord {
    /// Name of the axis the coordinate lies along
    pub dim: String,
    /// One value per index of that axis
    pub values: CoordValues,
}

/// An N-dimensional array with named axes and optional coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    data: ArrayD<f64>,
    dims: Vec<String>,
    coords: BTreeMap<String, Coord>,
}

impl Grid {
    /// Create a grid from raw data and axis names
    ///
    /// # Errors
    ///
    /// Returns an error if the number of names does not match the number
    /// of array dimensions.
    pub fn new(data: ArrayD<f64>, dims: &[&str]) -> Result<Self> {
        if dims.len() != data.ndim() {
            return Err(EnsSigError::ShapeMismatch {
                message: format!(
                    "{} dimension names given for an array with {} dimensions",
                    dims.len(),
                    data.ndim()
                ),
            });
        }
        Ok(Self {
            data,
            dims: dims.iter().map(|d| (*d).to_string()).collect(),
            coords: BTreeMap::new(),
        })
    }

    pub(crate) fn from_parts(
        data: ArrayD<f64>,
        dims: Vec<String>,
        coords: BTreeMap<String, Coord>,
    ) -> Self {
        Self { data, dims, coords }
    }

    /// Attach a named coordinate along an existing axis (builder style)
    ///
    /// # Errors
    ///
    /// Returns an error if the axis is absent or the value count does not
    /// match the axis length.
    pub fn with_coord(mut self, name: &str, dim: &str, values: CoordValues) -> Result<Self> {
        let axis = self.axis_of(dim)?;
        let len = self.data.len_of(Axis(axis));
        if values.len() != len {
            return Err(EnsSigError::ShapeMismatch {
                message: format!(
                    "coordinate '{}' has {} values but axis '{}' has length {}",
                    name,
                    values.len(),
                    dim,
                    len
                ),
            });
        }
        self.coords.insert(
            name.to_string(),
            Coord {
                dim: dim.to_string(),
                values,
            },
        );
        Ok(self)
    }

    /// Attach latitudes in degrees to the `lat` axis
    ///
    /// # Errors
    ///
    /// Returns an error if there is no `lat` axis or the length disagrees.
    pub fn with_latitudes(self, latitudes: Vec<f64>) -> Result<Self> {
        self.with_coord("lat", "lat", CoordValues::Float(latitudes))
    }

    /// The underlying data array
    #[must_use]
    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    /// Axis names, in array order
    #[must_use]
    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    /// Shape of the data array
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Number of dimensions
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Position of a named axis
    ///
    /// # Errors
    ///
    /// Returns an error if the axis is not present.
    pub fn axis_of(&self, dim: &str) -> Result<usize> {
        self.dims
            .iter()
            .position(|d| d == dim)
            .ok_or_else(|| EnsSigError::DimensionNotFound {
                dim: dim.to_string(),
                dims: self.dims.clone(),
            })
    }

    /// Length of a named axis
    ///
    /// # Errors
    ///
    /// Returns an error if the axis is not present.
    pub fn size_of(&self, dim: &str) -> Result<usize> {
        Ok(self.data.len_of(Axis(self.axis_of(dim)?)))
    }

    /// Look up a coordinate by name
    #[must_use]
    pub fn coord(&self, name: &str) -> Option<&Coord> {
        self.coords.get(name)
    }

    pub(crate) fn coords(&self) -> &BTreeMap<String, Coord> {
        &self.coords
    }

    /// Latitudes in degrees, when the `lat` coordinate is present
    #[must_use]
    pub fn latitudes(&self) -> Option<&[f64]> {
        match self.coords.get("lat") {
            Some(Coord {
                values: CoordValues::Float(v),
                ..
            }) => Some(v),
            _ => None,
        }
    }

    /// Integer grouping keys of a coordinate, with the axis they lie along
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinate is absent or not integer-valued.
    pub fn group_keys(&self, name: &str) -> Result<(&str, &[i64])> {
        match self.coords.get(name) {
            Some(Coord {
                dim,
                values: CoordValues::Int(keys),
            }) => Ok((dim.as_str(), keys.as_slice())),
            _ => Err(EnsSigError::CoordinateNotFound {
                coord: name.to_string(),
            }),
        }
    }

    /// Take a subset of indices along a named axis, subsetting any
    /// coordinates that lie along it
    ///
    /// # Errors
    ///
    /// Returns an error if the axis is not present or an index is out of
    /// range for it.
    pub fn select(&self, dim: &str, indices: &[usize]) -> Result<Self> {
        let axis = self.axis_of(dim)?;
        let len = self.data.len_of(Axis(axis));
        if let Some(&bad) = indices.iter().find(|&&i| i >= len) {
            return Err(EnsSigError::ShapeMismatch {
                message: format!(
                    "index {} is out of range for axis '{}' with length {}",
                    bad, dim, len
                ),
            });
        }
        let data = self.data.select(Axis(axis), indices);
        let coords = self
            .coords
            .iter()
            .map(|(name, c)| {
                let coord = if c.dim == dim {
                    Coord {
                        dim: c.dim.clone(),
                        values: c.values.subset(indices),
                    }
                } else {
                    c.clone()
                };
                (name.clone(), coord)
            })
            .collect();
        Ok(Self {
            data,
            dims: self.dims.clone(),
            coords,
        })
    }

    /// Drop the coordinates whose axis is no longer present, keeping the rest
    pub(crate) fn retained_coords(&self, kept_dims: &[String]) -> BTreeMap<String, Coord> {
        self.coords
            .iter()
            .filter(|(_, c)| kept_dims.iter().any(|d| *d == c.dim))
            .map(|(n, c)| (n.clone(), c.clone()))
            .collect()
    }
}
