use crate::map::LayerId;
use crate::tileset::TileSetId;
use std::fmt;

/// Which parallax parameter changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParallaxChange {
    /// Map eye distance.
    EyeDistance,
    /// Map viewport size.
    Viewport,
    /// View plane of one layer.
    LayerViewPlane,
}

/// Change notification fired by [`crate::Map`] mutators.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// Something visible changed; views should repaint.
    MapChanged,
    /// A layer was added at this index.
    LayerAdded(LayerId),
    /// The layer at this index was removed.
    LayerRemoved(LayerId),
    /// Two layers swapped places.
    LayersSwapped(LayerId, LayerId),
    /// A layer was renamed.
    LayerRenamed {
        /// Renamed layer.
        layer: LayerId,
        /// Name before the change.
        old_name: String,
        /// Name after the change.
        new_name: String,
    },
    /// A tileset was appended.
    TilesetAdded(TileSetId),
    /// A tileset and its cell references were removed.
    TilesetRemoved(TileSetId),
    /// A parallax parameter changed. `layer` is `None` for map-wide parameters.
    ParallaxChanged {
        /// Layer whose view plane changed.
        layer: Option<LayerId>,
        /// Parameter that changed.
        change: ParallaxChange,
    },
}

/// Handle returned when registering a listener, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Box<dyn FnMut(&MapEvent)>;

/// Observer list. Listeners run synchronously in registration order.
///
/// A listener only sees the event, never the map, so it cannot add or remove
/// listeners while being notified.
#[derive(Default)]
pub(crate) struct Listeners {
    next: u64,
    entries: Vec<(ListenerId, Callback)>,
}

impl Listeners {
    pub(crate) fn add(&mut self, callback: Callback) -> ListenerId {
        let id = ListenerId(self.next);
        self.next += 1;
        self.entries.push((id, callback));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(lid, _)| *lid != id);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn dispatch(&mut self, event: &MapEvent) {
        for (_, callback) in &mut self.entries {
            callback(event);
        }
    }
}

// Cloned maps start without listeners.
impl Clone for Listeners {
    fn clone(&self) -> Self {
        Listeners::default()
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}
