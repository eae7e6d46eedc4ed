pub enum Command {
    /// Every event within `distance` metres.
    Nearby {
        lon: f64,
        lat: f64,
        distance: f64,
    },
    NearbyPage {
        lon: f64,
        lat: f64,
        distance: f64,
        page_size: usize,
        page: usize,
    },
    Get {
        id: String,
    },
    Visit {
        id: String,
    },
    Reset {
        id: String,
        // conditional write instead of last-writer-wins
        checked: bool,
    },
    Info,
}
