//! Security (unlock/lock) command handlers.

use super::{with_session, CommandResult, Context};

pub fn unlock_status(ctx: &Context) -> CommandResult {
    with_session(ctx, |session| {
        let status = session.unlock_status()?;
        println!("Unlocked:    {}", status.unlocked);
        println!("In progress: {}", status.in_progress);
        if !status.keys.is_empty() {
            let keys: Vec<String> = status.keys.iter().map(|(r, c)| format!("({r},{c})")).collect();
            println!("Unlock keys: {}", keys.join(" "));
        }
        Ok(())
    })
}

/// Run the challenge; progress is printed by the session's unlock observer
pub fn unlock(ctx: &Context) -> CommandResult {
    with_session(ctx, |session| {
        let status = session.unlock_status()?;
        if status.unlocked {
            println!("Already unlocked.");
            return Ok(());
        }
        let keys: Vec<String> = status.keys.iter().map(|(r, c)| format!("({r},{c})")).collect();
        println!("Hold keys {} until unlocked...", keys.join(" "));
        session.unlock()?;
        Ok(())
    })
}

pub fn lock(ctx: &Context) -> CommandResult {
    with_session(ctx, |session| {
        session.lock()?;
        println!("Locked.");
        Ok(())
    })
}
