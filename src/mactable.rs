use std::collections::HashMap;
use std::net::SocketAddr;

use crate::addr::Mac;

/// Static mapping from MAC to carrier endpoint, shared by every host on
/// the simulated segment. This is what stands in for an actual shared
/// medium: the physical layer looks up where a destination MAC lives and
/// sends the frame there as a datagram.
#[derive(Clone)]
pub struct MacTable {
    map: HashMap<Mac, SocketAddr>,
}

impl MacTable {
    pub fn new() -> Self {
        MacTable {
            map: HashMap::new(),
        }
    }

    pub fn query(&self, mac: &Mac) -> Option<SocketAddr> {
        self.map.get(mac).copied()
    }

    pub fn insert(&mut self, mac: Mac, endpoint: SocketAddr) {
        self.map.insert(mac, endpoint);
    }
}

impl Default for MacTable {
    fn default() -> Self {
        MacTable::new()
    }
}

impl FromIterator<(Mac, SocketAddr)> for MacTable {
    fn from_iter<I: IntoIterator<Item = (Mac, SocketAddr)>>(iter: I) -> Self {
        MacTable {
            map: iter.into_iter().collect(),
        }
    }
}
