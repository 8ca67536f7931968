//! External-string to dense-index bijection.

use rustc_hash::FxHashMap;
use taro_common::{NodeId, ReasonCode, RouteError};

use crate::topology::Fnv;

#[derive(Debug)]
pub struct IdMapper {
    to_internal: FxHashMap<String, u32>,
    to_external: Vec<String>,
    fingerprint: u64,
}

impl IdMapper {
    /// Build from the dense list of external ids; position = internal index.
    pub fn new(external_ids: Vec<String>) -> Result<Self, RouteError> {
        let mut to_internal = FxHashMap::default();
        let mut fp = Fnv::new();
        for (idx, id) in external_ids.iter().enumerate() {
            for b in id.as_bytes() {
                fp.update_u64(*b as u64);
            }
            fp.update_u64(0xff);
            if to_internal.insert(id.clone(), idx as u32).is_some() {
                return Err(RouteError::new(ReasonCode::ModelMapperInvalid)
                    .with_message(format!("duplicate external id '{id}'")));
            }
        }
        Ok(Self {
            to_internal,
            to_external: external_ids,
            fingerprint: fp.finish(),
        })
    }

    #[inline]
    pub fn internal(&self, external: &str) -> Option<NodeId> {
        self.to_internal.get(external).copied().map(NodeId)
    }

    #[inline]
    pub fn external(&self, node: NodeId) -> Option<&str> {
        self.to_external.get(node.index()).map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.to_external.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.to_external.is_empty()
    }

    #[inline]
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}
