//! Scenario tests for background suspension.
//!
//! Hiding the page while sharing without background permission stops
//! the engine after the fixed delay; any input flipping back before the
//! delay elapses cancels the pending stop.

use std::time::Duration;

use peerlink_bridge::{LifecycleState, SUSPEND_DELAY};
use peerlink_engine::Platform;
use peerlink_harness::Scenario;

#[tokio::test(start_paused = true)]
async fn hidden_while_sharing_stops_after_delay() {
    Scenario::new("suspend-after-delay")
        .initialize()
        .start()
        .hide_page()
        .advance(SUSPEND_DELAY + Duration::from_secs(1))
        .oracle(Box::new(|world| {
            if world.engine().stops() != 1 {
                return Err(format!("expected 1 stop, got {}", world.engine().stops()));
            }
            // Engine re-emitted ready after teardown.
            if world.lifecycle_state() != LifecycleState::Ready {
                return Err(format!("expected Ready, got {}", world.lifecycle_state()));
            }
            if world.suspension_armed() {
                return Err("timer must be consumed after firing".to_string());
            }
            Ok(())
        }))
        .run()
        .await
        .expect("scenario should succeed");
}

#[tokio::test(start_paused = true)]
async fn visibility_restored_before_delay_cancels_the_stop() {
    Scenario::new("suspend-cancelled-by-visibility")
        .initialize()
        .start()
        .hide_page()
        .advance(SUSPEND_DELAY - Duration::from_secs(5))
        .show_page()
        .advance(SUSPEND_DELAY * 2)
        .oracle(Box::new(|world| {
            if world.engine().stops() != 0 {
                return Err(format!("expected no stop, got {}", world.engine().stops()));
            }
            if world.lifecycle_state() != LifecycleState::Running {
                return Err(format!("expected Running, got {}", world.lifecycle_state()));
            }
            Ok(())
        }))
        .run()
        .await
        .expect("scenario should succeed");
}

#[tokio::test(start_paused = true)]
async fn background_permission_prevents_arming() {
    Scenario::new("suspend-background-allowed")
        .initialize()
        .start()
        .set_background_allowed(Platform::Desktop, true)
        .hide_page()
        .advance(SUSPEND_DELAY * 2)
        .oracle(Box::new(|world| {
            if world.engine().stops() != 0 {
                return Err(format!("expected no stop, got {}", world.engine().stops()));
            }
            if world.lifecycle_state() != LifecycleState::Running {
                return Err(format!("expected Running, got {}", world.lifecycle_state()));
            }
            Ok(())
        }))
        .run()
        .await
        .expect("scenario should succeed");
}

#[tokio::test(start_paused = true)]
async fn permission_granted_while_armed_disarms() {
    Scenario::new("suspend-disarmed-by-permission")
        .initialize()
        .start()
        .hide_page()
        .advance(Duration::from_secs(30))
        .set_background_allowed(Platform::Desktop, true)
        .advance(SUSPEND_DELAY * 2)
        .oracle(Box::new(|world| {
            if world.engine().stops() != 0 {
                return Err(format!("expected no stop, got {}", world.engine().stops()));
            }
            Ok(())
        }))
        .run()
        .await
        .expect("scenario should succeed");
}

#[tokio::test(start_paused = true)]
async fn permission_is_keyed_by_platform() {
    // Desktop permission does not cover a mobile page.
    Scenario::new("suspend-wrong-platform-permission")
        .platform(Platform::Mobile)
        .initialize()
        .start()
        .set_background_allowed(Platform::Desktop, true)
        .hide_page()
        .advance(SUSPEND_DELAY + Duration::from_secs(1))
        .oracle(Box::new(|world| {
            if world.engine().stops() != 1 {
                return Err(format!("expected 1 stop, got {}", world.engine().stops()));
            }
            Ok(())
        }))
        .run()
        .await
        .expect("scenario should succeed");

    Scenario::new("suspend-right-platform-permission")
        .platform(Platform::Mobile)
        .initialize()
        .start()
        .set_background_allowed(Platform::Mobile, true)
        .hide_page()
        .advance(SUSPEND_DELAY * 2)
        .oracle(Box::new(|world| {
            if world.engine().stops() != 0 {
                return Err(format!("expected no stop, got {}", world.engine().stops()));
            }
            Ok(())
        }))
        .run()
        .await
        .expect("scenario should succeed");
}

#[tokio::test(start_paused = true)]
async fn hiding_without_sharing_never_arms() {
    Scenario::new("suspend-not-sharing")
        .initialize()
        .hide_page()
        .advance(SUSPEND_DELAY * 2)
        .oracle(Box::new(|world| {
            if world.engine().stops() != 0 {
                return Err(format!("expected no stop, got {}", world.engine().stops()));
            }
            if world.suspension_armed() {
                return Err("policy must not arm while not sharing".to_string());
            }
            Ok(())
        }))
        .run()
        .await
        .expect("scenario should succeed");
}

#[tokio::test(start_paused = true)]
async fn rearming_restarts_the_full_delay() {
    // Hide, almost expire, show, hide again: the second arming gets a
    // fresh full delay.
    Scenario::new("suspend-rearm-full-delay")
        .initialize()
        .start()
        .hide_page()
        .advance(SUSPEND_DELAY - Duration::from_secs(1))
        .show_page()
        .hide_page()
        .advance(SUSPEND_DELAY - Duration::from_secs(1))
        .oracle(Box::new(|world| {
            if world.engine().stops() != 0 {
                return Err(format!("stop fired early: {}", world.engine().stops()));
            }
            if !world.suspension_armed() {
                return Err("second arming should still be pending".to_string());
            }
            Ok(())
        }))
        .run()
        .await
        .expect("scenario should succeed");
}

#[tokio::test(start_paused = true)]
async fn suspension_stop_resumes_on_user_start() {
    // After a suspension stop the user can start again once ready.
    Scenario::new("suspend-then-restart")
        .initialize()
        .start()
        .hide_page()
        .advance(SUSPEND_DELAY + Duration::from_secs(1))
        .show_page()
        .start()
        .oracle(Box::new(|world| {
            if world.lifecycle_state() != LifecycleState::Running {
                return Err(format!("expected Running, got {}", world.lifecycle_state()));
            }
            if world.engine().starts() != 2 {
                return Err(format!("expected 2 starts, got {}", world.engine().starts()));
            }
            Ok(())
        }))
        .run()
        .await
        .expect("scenario should succeed");
}
