//! Interactive shell: line-oriented commands driving the outbound actions,
//! plus the printer for inbound events. Display-only; every protocol rule
//! lives below this layer.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{filter::EnvFilter, reload, Registry};

use lsnp_core::{unix_now, validate_token, Avatar, LikeAction, Scope, UserId};
use lsnp_network::{Event, Node};

const HELP: &str = "\
Commands:
  profile <username> <display> [status...]   set or update your profile
  setavatar <path>                           attach an avatar image and re-announce
  post <text...>                             post to your followers
  dm <user@ip> <text...>                     reliable direct message
  follow <user@ip> / unfollow <user@ip>      manage who you follow
  like <user@ip> <post-ts> [unlike]          react to a post you hold
  list                                       known peers and follow state
  show <user@ip>                             posts and DMs from one peer
  followers                                  who follows you
  ttt invite <user@ip>                       start a tic-tac-toe game (you are X)
  ttt move <gameid> <0-8>                    place your mark
  ttt board <gameid>                         print the board
  groups                                     your groups
  group create <name> <u@ip,u@ip,...>        create a group
  group update <gid> [+u@ip]... [-u@ip]...   add/remove members (creator only)
  group msg <gid> <text...>                  message the group
  group show <gid>                           group details and history
  sendfile <user@ip> <path> [descr...]       offer and stream a file
  verbose on|off                             toggle wire logging
  help                                       this text
  exit                                       revoke issued tokens and quit";

pub type FilterHandle = reload::Handle<EnvFilter, Registry>;

pub async fn run(node: Arc<Node>, filter: FilterHandle) -> Result<()> {
    println!("LSNP shell. Type 'help' for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Some(line) = lines.next_line().await? else {
            // EOF: same path as exit
            node.shutdown().await;
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" {
            node.shutdown().await;
            println!("bye");
            break;
        }
        if let Err(e) = command(&node, &filter, line).await {
            println!("error: {e}");
        }
    }
    Ok(())
}

async fn command(node: &Node, filter: &FilterHandle, line: &str) -> Result<()> {
    let mut words = line.split_whitespace();
    let cmd = words.next().unwrap_or_default();
    match cmd {
        "help" => println!("{HELP}"),
        "profile" => {
            let username = words.next().ok_or_else(|| anyhow!("usage: profile <username> <display> [status...]"))?;
            let display = words.next().ok_or_else(|| anyhow!("usage: profile <username> <display> [status...]"))?;
            let status = words.collect::<Vec<_>>().join(" ");
            node.set_profile(username, display, &status, None).await?;
            println!("profile announced");
        }
        "setavatar" => {
            let path = words.next().ok_or_else(|| anyhow!("usage: setavatar <path>"))?;
            let avatar = load_avatar(path)?;
            let (username, display, status) = {
                let store = node.store();
                let store = store.lock().await;
                let own = store.own().ok_or_else(|| anyhow!("set a profile first"))?;
                (
                    own.user_id.username.clone(),
                    own.display_name.clone(),
                    own.status.clone(),
                )
            };
            node.set_profile(&username, &display, &status, Some(avatar))
                .await?;
            println!("avatar attached");
        }
        "post" => {
            let content = rest(line, 1).ok_or_else(|| anyhow!("usage: post <text...>"))?;
            node.post(&content).await?;
            println!("posted to followers");
        }
        "dm" => {
            let to: UserId = parse_user(words.next())?;
            let content = rest(line, 2).ok_or_else(|| anyhow!("usage: dm <user@ip> <text...>"))?;
            node.dm(&to, &content).await?;
            println!("dm sent to {to}");
        }
        "follow" => {
            let target: UserId = parse_user(words.next())?;
            node.follow(&target).await?;
            println!("now following {target}");
        }
        "unfollow" => {
            let target: UserId = parse_user(words.next())?;
            node.unfollow(&target).await?;
            println!("unfollowed {target}");
        }
        "like" => {
            let target: UserId = parse_user(words.next())?;
            let ts: u64 = words
                .next()
                .and_then(|w| w.parse().ok())
                .ok_or_else(|| anyhow!("usage: like <user@ip> <post-ts> [unlike]"))?;
            let action = match words.next() {
                Some("unlike") => LikeAction::Unlike,
                _ => LikeAction::Like,
            };
            node.like(&target, ts, action).await?;
            println!("{} sent", action.as_str().to_lowercase());
        }
        "list" => list_peers(node).await,
        "show" => {
            let target: UserId = parse_user(words.next())?;
            show_peer(node, &target).await;
        }
        "followers" => {
            let store = node.store();
            let store = store.lock().await;
            let followers = store.followers();
            if followers.is_empty() {
                println!("nobody follows you yet");
            } else {
                for f in followers {
                    println!("  {} ({f})", store.display_name_of(f));
                }
            }
        }
        "ttt" => ttt_command(node, line).await?,
        "groups" => {
            let store = node.store();
            let store = store.lock().await;
            if store.groups().is_empty() {
                println!("no groups");
            }
            for (gid, group) in store.groups() {
                println!("  {} ({gid}) - {} members", group.name, group.members.len());
            }
        }
        "group" => group_command(node, line).await?,
        "sendfile" => {
            let to: UserId = parse_user(words.next())?;
            let path = words.next().ok_or_else(|| anyhow!("usage: sendfile <user@ip> <path> [descr...]"))?;
            let description = rest(line, 3);
            let bytes = std::fs::read(path)?;
            let filename = Path::new(path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("file.bin");
            let file_id = node
                .send_file(&to, filename, &guess_mime(path), &bytes, description)
                .await?;
            println!("file {filename} offered as {file_id} ({} bytes)", bytes.len());
        }
        "verbose" => match words.next() {
            Some("on") => {
                filter.reload(EnvFilter::new("debug"))?;
                println!("verbose logging on");
            }
            Some("off") => {
                filter.reload(EnvFilter::new("info"))?;
                println!("verbose logging off");
            }
            _ => println!("usage: verbose on|off"),
        },
        _ => println!("unknown command, try 'help'"),
    }
    Ok(())
}

async fn ttt_command(node: &Node, line: &str) -> Result<()> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.get(1).copied() {
        Some("invite") => {
            let opponent: UserId = parse_user(words.get(2).copied())?;
            let game_id = node.invite_game(&opponent).await?;
            println!("invited {opponent}, game {game_id}, you are X");
        }
        Some("move") => {
            let game_id = words.get(2).ok_or_else(|| anyhow!("usage: ttt move <gameid> <0-8>"))?;
            let position: u8 = words
                .get(3)
                .and_then(|w| w.parse().ok())
                .ok_or_else(|| anyhow!("position must be 0-8"))?;
            let board = node.play_move(game_id, position).await?;
            println!("{board}");
        }
        Some("board") => {
            let game_id = words.get(2).ok_or_else(|| anyhow!("usage: ttt board <gameid>"))?;
            let store = node.store();
            let store = store.lock().await;
            match store.game(game_id) {
                Some(game) => {
                    println!("{}", game.render());
                    println!(
                        "you are {}, {}",
                        game.my_symbol,
                        if game.my_turn { "your turn" } else { "their turn" }
                    );
                }
                None => println!("no active game {game_id}"),
            }
        }
        _ => println!("usage: ttt invite|move|board ..."),
    }
    Ok(())
}

async fn group_command(node: &Node, line: &str) -> Result<()> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.get(1).copied() {
        Some("create") => {
            let name = words.get(2).ok_or_else(|| anyhow!("usage: group create <name> <u@ip,...>"))?;
            let members = words
                .get(3)
                .map(|list| parse_user_list(list))
                .transpose()?
                .unwrap_or_default();
            let group_id = node.create_group(name, members).await?;
            println!("group {name} created as {group_id}");
        }
        Some("update") => {
            let group_id = words.get(2).ok_or_else(|| anyhow!("usage: group update <gid> [+u@ip] [-u@ip]"))?;
            let mut add = Vec::new();
            let mut remove = Vec::new();
            for w in &words[3..] {
                if let Some(u) = w.strip_prefix('+') {
                    add.push(u.parse().map_err(|e| anyhow!("{e}"))?);
                } else if let Some(u) = w.strip_prefix('-') {
                    remove.push(u.parse().map_err(|e| anyhow!("{e}"))?);
                } else {
                    return Err(anyhow!("members must be prefixed with + or -"));
                }
            }
            node.update_group(group_id, add, remove).await?;
            println!("group {group_id} updated");
        }
        Some("msg") => {
            let group_id = words.get(2).ok_or_else(|| anyhow!("usage: group msg <gid> <text...>"))?;
            let content = rest(line, 3).ok_or_else(|| anyhow!("usage: group msg <gid> <text...>"))?;
            node.group_message(group_id, &content).await?;
            println!("sent to {group_id}");
        }
        Some("show") => {
            let group_id = words.get(2).ok_or_else(|| anyhow!("usage: group show <gid>"))?;
            let store = node.store();
            let store = store.lock().await;
            match store.group(group_id) {
                Some(group) => {
                    println!("{} ({group_id}), created by {}", group.name, group.creator);
                    for m in &group.members {
                        println!("  member {m}");
                    }
                    for msg in group.messages.iter().rev().take(10).rev() {
                        println!("  [{}] {}: {}", msg.timestamp, msg.from, msg.content);
                    }
                }
                None => println!("unknown group {group_id}"),
            }
        }
        _ => println!("usage: group create|update|msg|show ..."),
    }
    Ok(())
}

async fn list_peers(node: &Node) {
    let store = node.store();
    let store = store.lock().await;
    if store.peers().is_empty() {
        println!("no peers discovered yet");
        return;
    }
    for (user_id, peer) in store.peers() {
        let following = if store.is_following(user_id) {
            " (following)"
        } else {
            ""
        };
        let avatar = if peer.avatar.is_some() { " [avatar]" } else { "" };
        println!("  {} ({user_id}){following}{avatar}", peer.display_name);
    }
}

async fn show_peer(node: &Node, target: &UserId) {
    let store = node.store();
    let store = store.lock().await;
    let Some(peer) = store.peer(target) else {
        println!("peer {target} not known");
        return;
    };
    println!("{} ({target})", peer.display_name);
    println!("status: {}", peer.status);
    let now = unix_now();
    println!("posts:");
    for post in &peer.posts {
        // only posts with a live token are shown
        if validate_token(&post.token, Scope::Broadcast, now, store.revoked_tokens()).is_ok() {
            println!("  [{}] {}", post.timestamp.unwrap_or_default(), post.content);
        }
    }
    println!("dms:");
    for dm in &peer.dms {
        if validate_token(&dm.token, Scope::Chat, now, store.revoked_tokens()).is_ok() {
            println!("  [{}] {}", dm.timestamp, dm.content);
        }
    }
}

/// Prints inbound happenings; also the one place received files land on
/// disk.
pub async fn render_events(node: Arc<Node>, mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match event {
            Event::ProfileUpdated { user, display_name } => {
                println!("<< {display_name} ({user}) is around");
            }
            Event::PostReceived { from, content } => println!("<< post from {from}: {content}"),
            Event::DmReceived { from, content } => println!("<< dm from {from}: {content}"),
            Event::DmAcked { message_id } => println!("<< dm {message_id} delivered"),
            Event::FollowerAdded { user } => println!("<< {user} now follows you"),
            Event::FollowerRemoved { user } => println!("<< {user} unfollowed you"),
            Event::LikeReceived {
                from,
                action,
                post_timestamp,
            } => println!("<< {from} {}d your post [{post_timestamp}]", action.as_str().to_lowercase()),
            Event::GameInvite {
                game_id,
                from,
                my_symbol,
            } => println!("<< {from} invited you to game {game_id}, you are {my_symbol}"),
            Event::GameBoard { game_id, board, my_turn } => {
                println!("<< game {game_id}:");
                println!("{board}");
                if my_turn {
                    println!("your move");
                }
            }
            Event::GameOver {
                game_id,
                result,
                winner_symbol,
                board,
            } => {
                println!("<< game {game_id} over: {result}");
                if let Some(symbol) = winner_symbol {
                    println!("   {symbol} wins");
                }
                println!("{board}");
            }
            Event::GroupCreated { group_id, name, creator } => {
                println!("<< {creator} added you to group {name} ({group_id})");
            }
            Event::GroupUpdated { group_id } => println!("<< group {group_id} membership changed"),
            Event::GroupMessageReceived {
                group_id,
                from,
                content,
            } => println!("<< [{group_id}] {from}: {content}"),
            Event::FileOffered {
                file_id,
                from,
                filename,
                filesize,
            } => println!("<< {from} offers {filename} ({filesize} bytes) as {file_id}"),
            Event::FileCompleted {
                file_id,
                from,
                filename,
                size,
            } => {
                println!("<< file {filename} from {from} complete ({size} bytes)");
                save_incoming_file(&node, &file_id, &filename).await;
            }
            Event::FileDelivered { file_id, by } => {
                println!("<< {by} confirmed receipt of {file_id}");
            }
        }
    }
}

async fn save_incoming_file(node: &Node, file_id: &str, filename: &str) {
    let store = node.store();
    let store = store.lock().await;
    let Some(payload) = store.incoming_file(file_id).and_then(|f| f.payload()) else {
        return;
    };
    let dest = format!("received_{filename}");
    match std::fs::write(&dest, payload) {
        Ok(()) => println!("   saved as {dest}"),
        Err(e) => println!("   could not save {dest}: {e}"),
    }
}

fn parse_user(word: Option<&str>) -> Result<UserId> {
    word.ok_or_else(|| anyhow!("expected a user@ip argument"))?
        .parse()
        .map_err(|e| anyhow!("{e}"))
}

fn parse_user_list(list: &str) -> Result<Vec<UserId>> {
    list.split(',')
        .filter(|p| !p.trim().is_empty())
        .map(|p| p.trim().parse().map_err(|e| anyhow!("{e}")))
        .collect()
}

/// Everything after the first `skip` whitespace-separated words.
fn rest(line: &str, skip: usize) -> Option<String> {
    let mut iter = line.splitn(skip + 1, char::is_whitespace);
    for _ in 0..skip {
        iter.next()?;
    }
    let tail = iter.next()?.trim();
    if tail.is_empty() {
        None
    } else {
        Some(tail.to_string())
    }
}

fn load_avatar(path: &str) -> Result<Avatar> {
    let bytes = std::fs::read(path)?;
    if bytes.len() > 20 * 1024 {
        return Err(anyhow!("avatar must be under 20 KiB"));
    }
    Ok(Avatar {
        mime: guess_mime(path),
        encoding: "base64".into(),
        data: BASE64.encode(&bytes),
    })
}

fn guess_mime(path: &str) -> String {
    match Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("txt") | Some("md") => "text/plain",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
    .to_string()
}
