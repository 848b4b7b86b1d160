use convene_models::{Channel, Guild, Snowflake, User};
use dashmap::DashMap;

/// Lookup of entities an event refers to by id.
pub trait IdentityResolver: Send + Sync {
    fn guild(&self, guild_id: Snowflake) -> Option<Guild>;

    fn channel(&self, channel_id: Snowflake) -> Option<Channel>;

    fn user(&self, user_id: Snowflake) -> Option<User>;

    /// Record a user seen in a payload and return the canonical copy.
    fn store_user(&self, user: User) -> User;
}

/// In-memory resolver backed by concurrent maps.
#[derive(Debug, Default)]
pub struct MemoryResolver {
    guilds: DashMap<Snowflake, Guild>,
    channels: DashMap<Snowflake, Channel>,
    users: DashMap<Snowflake, User>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_guild(&self, guild: Guild) {
        self.guilds.insert(guild.id, guild);
    }

    pub fn insert_channel(&self, channel: Channel) {
        self.channels.insert(channel.id, channel);
    }

    pub fn remove_guild(&self, guild_id: Snowflake) -> Option<Guild> {
        self.guilds.remove(&guild_id).map(|(_, guild)| guild)
    }
}

impl IdentityResolver for MemoryResolver {
    fn guild(&self, guild_id: Snowflake) -> Option<Guild> {
        self.guilds.get(&guild_id).map(|entry| entry.value().clone())
    }

    fn channel(&self, channel_id: Snowflake) -> Option<Channel> {
        self.channels.get(&channel_id).map(|entry| entry.value().clone())
    }

    fn user(&self, user_id: Snowflake) -> Option<User> {
        self.users.get(&user_id).map(|entry| entry.value().clone())
    }

    fn store_user(&self, user: User) -> User {
        self.users.insert(user.id, user.clone());
        user
    }
}
