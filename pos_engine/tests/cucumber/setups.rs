use cucumber::given;
use pos_engine::test_utils::fixtures::TestSystem;

use crate::cucumber::PosWorld;

#[given("a fresh store")]
async fn fresh_store(world: &mut PosWorld) {
    world.system = Some(TestSystem::new().await);
}
