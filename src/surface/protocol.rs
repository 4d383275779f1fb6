//! Messages exchanged between the coordinator and surface workers.
//!
//! The shapes mirror a JSON wire format so an out-of-process worker can
//! speak the same contract:
//!
//! - init: `{atoms: [{x, y, z, serial, elem}], volume}`
//! - job: `{surfaceType, expandedExtent, extendedAtomIndices,
//!   atomsToShowIndices}`
//! - result: `{vertices: [{x, y, z, atomId}], faces: [{a, b, c}]}`

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::molecule::Atom;

/// Kind of molecular surface to extract.
///
/// Numeric codes are stable and travel on the wire; codes `<= 0` are
/// reserved for control messages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(into = "i32", try_from = "i32")]
pub enum SurfaceType {
    /// Van der Waals surface.
    Vdw,
    /// Solvent-excluded surface.
    Ses,
    /// Solvent-accessible surface.
    Sas,
    /// Molecular surface.
    Ms,
}

impl SurfaceType {
    /// Wire code.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Vdw => 1,
            Self::Ses => 2,
            Self::Sas => 3,
            Self::Ms => 4,
        }
    }

    /// Whether the surface is inflated by the solvent probe radius.
    #[must_use]
    pub fn uses_probe(self) -> bool {
        !matches!(self, Self::Vdw)
    }
}

impl From<SurfaceType> for i32 {
    fn from(t: SurfaceType) -> Self {
        t.code()
    }
}

impl TryFrom<i32> for SurfaceType {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Vdw),
            2 => Ok(Self::Ses),
            3 => Ok(Self::Sas),
            4 => Ok(Self::Ms),
            other => Err(format!("invalid surface type code {other}")),
        }
    }
}

impl fmt::Display for SurfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vdw => "VDW",
            Self::Ses => "SES",
            Self::Sas => "SAS",
            Self::Ms => "MS",
        })
    }
}

/// Minimal per-atom projection shipped to workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducedAtom {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
    /// Z coordinate.
    pub z: f32,
    /// Position of the atom among the present atoms of the all-atoms
    /// selection.
    pub serial: u32,
    /// Element symbol.
    pub elem: String,
}

impl ReducedAtom {
    /// Project an atom, tagging it with its serial.
    #[must_use]
    pub fn from_atom(atom: &Atom, serial: u32) -> Self {
        Self {
            x: atom.position.x,
            y: atom.position.y,
            z: atom.position.z,
            serial,
            elem: atom.element.clone(),
        }
    }
}

/// Sent once to every worker before any job of a surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerInit {
    /// Every atom that may contribute to the surface, indexed by serial.
    pub atoms: Vec<ReducedAtom>,
    /// Volume of the whole surface extent, used to scale grid resolution.
    pub volume: f32,
}

/// One chunk of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceJob {
    /// Surface kind to extract.
    pub surface_type: SurfaceType,
    /// Padded chunk bounds as `[[min], [max]]`.
    pub expanded_extent: [[f32; 3]; 2],
    /// Serials of atoms inside the padded bounds.
    pub extended_atom_indices: Vec<u32>,
    /// Serials of atoms inside the unpadded bounds whose surface is kept.
    pub atoms_to_show_indices: Vec<u32>,
}

/// A result vertex, tagged with the serial of the atom it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedVertex {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
    /// Z coordinate.
    pub z: f32,
    /// Serial of the owning atom.
    pub atom_id: u32,
}

/// A triangle as three indices into the vertex list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Face {
    /// First corner.
    pub a: u32,
    /// Second corner.
    pub b: u32,
    /// Third corner.
    pub c: u32,
}

/// Worker output for one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMesh {
    /// Surface vertices.
    pub vertices: Vec<ExtractedVertex>,
    /// Triangles indexing into `vertices`.
    pub faces: Vec<Face>,
}
