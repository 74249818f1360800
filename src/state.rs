use crate::config::CascadeConfig;
use crate::database::store::SharedStore;
use crate::services::cascade::{CascadeQueue, CascadeWorker};
use crate::services::clubs::ClubService;
use crate::services::denormalize::Denormalizer;
use crate::services::games::GameService;
use crate::services::players::PlayerService;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub games: GameService,
    pub players: PlayerService,
    pub clubs: ClubService,
}

impl AppState {
    /// Wires every service around one store handle. The returned worker
    /// must be spawned for cascades to run.
    pub fn new(store: SharedStore, cascade: CascadeConfig) -> (Self, CascadeWorker) {
        let denormalizer = Denormalizer::new(store.clone());
        let (queue, receiver) = CascadeQueue::channel();
        let worker = CascadeWorker::new(receiver, denormalizer.clone(), cascade);

        let games = GameService::new(store.clone(), denormalizer.clone(), queue.clone());
        let players = PlayerService::new(store.clone(), denormalizer, queue, games.clone());
        let clubs = ClubService::new(store.clone());

        let state = AppState {
            store,
            games,
            players,
            clubs,
        };
        (state, worker)
    }
}
