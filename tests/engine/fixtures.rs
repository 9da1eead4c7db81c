//! Record types shared by the engine integration tests.
//!
//! `Cluster` can reference itself (`seed`) and a `Track` (`track`); `Track`
//! references a `Cluster` back: enough shape for self-references,
//! intra-collection cycles, and cross-collection cycles.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tessera_storage::{RecordDescriptor, RecordType, TypeRegistry};

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HitData {
    pub cell: u64,
    pub charge: f64,
}

pub enum Hit {}

static HIT_DESCRIPTOR: RecordDescriptor = RecordDescriptor {
    type_name: "Hit",
    single_relations: &[],
    multi_relations: &[],
    vector_members: &[],
};

impl RecordType for Hit {
    type Payload = HitData;
    type Scalar = f64;

    fn descriptor() -> &'static RecordDescriptor {
        &HIT_DESCRIPTOR
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterData {
    pub energy: f64,
}

pub enum Cluster {}

static CLUSTER_DESCRIPTOR: RecordDescriptor = RecordDescriptor {
    type_name: "Cluster",
    single_relations: &["seed", "track"],
    multi_relations: &["hits"],
    vector_members: &["weights"],
};

impl RecordType for Cluster {
    type Payload = ClusterData;
    type Scalar = f64;

    fn descriptor() -> &'static RecordDescriptor {
        &CLUSTER_DESCRIPTOR
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackData {
    pub momentum: f64,
}

pub enum Track {}

static TRACK_DESCRIPTOR: RecordDescriptor = RecordDescriptor {
    type_name: "Track",
    single_relations: &["cluster"],
    multi_relations: &[],
    vector_members: &[],
};

impl RecordType for Track {
    type Payload = TrackData;
    type Scalar = f64;

    fn descriptor() -> &'static RecordDescriptor {
        &TRACK_DESCRIPTOR
    }
}

/// Registry covering every fixture type.
pub fn registry() -> Arc<TypeRegistry> {
    let mut registry = TypeRegistry::new();
    registry.register::<Hit>();
    registry.register::<Cluster>();
    registry.register::<Track>();
    registry.freeze()
}
