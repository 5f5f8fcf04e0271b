use chrono::{Duration, Utc};

use crate::{
    AssetData, Database, DatabaseError, ListenData, NewListen, OpentoneContext, PrimaryKey,
};

/// Decides which audio requests count as real plays and records them
pub struct Listens<Db> {
    context: OpentoneContext<Db>,
}

/// What the listen recorder gets to see about an audio request
#[derive(Debug, Clone, Default)]
pub struct ListenRequest {
    pub ip: String,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    /// An explicit source override from the query string, e.g. "itunes"
    pub source_override: Option<String>,
    pub listener_id: Option<PrimaryKey>,
}

impl<Db> Listens<Db>
where
    Db: Database,
{
    /// How long repeated plays from the same IP don't count
    pub const RECENT_WINDOW_MINUTES: i64 = 5;

    /// Case-insensitive substrings that mark a user agent as a crawler
    const BOT_SIGNATURES: &'static [&'static str] = &[
        "bot",
        "spider",
        "crawler",
        "baidu",
        "nutch",
        "slurp",
        "facebookexternalhit",
    ];

    pub fn new(context: &OpentoneContext<Db>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Records a play unless the request looks like a crawler or a refresh.
    /// Returns the created listen, or None when the request was filtered.
    pub async fn register(
        &self,
        asset: &AssetData,
        request: ListenRequest,
    ) -> Result<Option<ListenData>, DatabaseError> {
        if Self::is_bot(request.user_agent.as_deref()) {
            return Ok(None);
        }

        let since = Utc::now() - Duration::minutes(Self::RECENT_WINDOW_MINUTES);

        if self
            .context
            .database
            .recent_listen_exists(asset.id, &request.ip, since)
            .await?
        {
            return Ok(None);
        }

        let listen = self
            .context
            .database
            .create_listen(NewListen {
                asset_id: asset.id,
                track_owner_id: asset.user_id,
                listener_id: request.listener_id,
                source: Self::resolve_source(&request),
                ip: request.ip,
                user_agent: request.user_agent.unwrap_or_default(),
                created_at: Utc::now(),
            })
            .await?;

        Ok(Some(listen))
    }

    pub async fn count_for(&self, asset_id: PrimaryKey) -> Result<i64, DatabaseError> {
        self.context.database.count_listens_for_asset(asset_id).await
    }

    /// An empty user agent is always a crawler, everything else is matched
    /// against the signature list
    pub fn is_bot(user_agent: Option<&str>) -> bool {
        let Some(agent) = user_agent.filter(|agent| !agent.trim().is_empty()) else {
            return true;
        };

        let lowered = agent.to_lowercase();

        Self::BOT_SIGNATURES
            .iter()
            .any(|signature| lowered.contains(signature))
    }

    fn resolve_source(request: &ListenRequest) -> String {
        request
            .source_override
            .clone()
            .or_else(|| request.referrer.clone())
            .unwrap_or_else(|| "direct hit".to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{create_asset, create_user, test_harness};
    use crate::NewListen;

    const GOOD_USER_AGENTS: &[&str] = &[
        "Mozilla/5.0 (Macintosh; U; Intel Mac OS X; en) AppleWebKit/XX (KHTML, like Gecko) Safari/YY",
        "Mozilla/5.0 (Windows; U; Windows NT 5.1; en-US; rv:1.8) Gecko/20060319 Firefox/2.0",
        "iTunes/x.x.x",
        "Mozilla/4.0 (compatible; MSIE 7.0b; Windows NT 6.0)",
        "msie",
        "webkit",
    ];

    const BAD_USER_AGENTS: &[&str] = &[
        "Mp3Bot/0.1 (http://mp3realm.org/mp3bot/)",
        "",
        "Googlebot/2.1 (+http://www.google.com/bot.html)",
        "you're momma's so bot...",
        "Baiduspider+(+http://www.baidu.jp/spider/)",
        "baidu/Nutch-1.0 ",
    ];

    fn request(agent: &str) -> ListenRequest {
        ListenRequest {
            ip: "10.0.0.1".to_string(),
            user_agent: Some(agent.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_bot_detection() {
        for agent in BAD_USER_AGENTS {
            assert!(
                Listens::<crate::SqliteDatabase>::is_bot(Some(agent)),
                "{agent:?} should be considered a bot"
            );
        }

        for agent in GOOD_USER_AGENTS {
            assert!(
                !Listens::<crate::SqliteDatabase>::is_bot(Some(agent)),
                "{agent:?} should not be considered a bot"
            );
        }

        assert!(Listens::<crate::SqliteDatabase>::is_bot(None));
    }

    #[tokio::test]
    async fn test_bots_never_register_listens() {
        let harness = test_harness("listens_bots").await;
        let listens = Listens::new(&harness.context);

        let user = create_user(&harness.context.database, "sudara").await;
        let asset = create_asset(&harness.context.database, &user, "Song 1").await;

        for agent in BAD_USER_AGENTS {
            let result = listens
                .register(&asset, request(agent))
                .await
                .expect("register doesn't error");

            assert!(result.is_none(), "{agent:?} should not create a listen");
        }

        assert_eq!(listens.count_for(asset.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_repeat_requests_within_window_count_once() {
        let harness = test_harness("listens_dedupe").await;
        let listens = Listens::new(&harness.context);

        let user = create_user(&harness.context.database, "sudara").await;
        let asset = create_asset(&harness.context.database, &user, "Song 1").await;

        for _ in 0..3 {
            listens
                .register(&asset, request(GOOD_USER_AGENTS[0]))
                .await
                .expect("register doesn't error");
        }

        assert_eq!(listens.count_for(asset.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_listen_counts_again_after_window_elapses() {
        let harness = test_harness("listens_window").await;
        let listens = Listens::new(&harness.context);

        let user = create_user(&harness.context.database, "sudara").await;
        let asset = create_asset(&harness.context.database, &user, "Song 1").await;

        // A play from an hour ago is well outside the window
        harness
            .context
            .database
            .create_listen(NewListen {
                asset_id: asset.id,
                track_owner_id: user.id,
                listener_id: None,
                source: "direct hit".to_string(),
                ip: "10.0.0.1".to_string(),
                user_agent: GOOD_USER_AGENTS[0].to_string(),
                created_at: Utc::now() - Duration::hours(1),
            })
            .await
            .expect("listen is created");

        let result = listens
            .register(&asset, request(GOOD_USER_AGENTS[0]))
            .await
            .expect("register doesn't error");

        assert!(result.is_some());
        assert_eq!(listens.count_for(asset.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_different_ips_are_not_deduplicated() {
        let harness = test_harness("listens_ips").await;
        let listens = Listens::new(&harness.context);

        let user = create_user(&harness.context.database, "sudara").await;
        let asset = create_asset(&harness.context.database, &user, "Song 1").await;

        for ip in ["10.0.0.1", "10.0.0.2"] {
            let result = listens
                .register(
                    &asset,
                    ListenRequest {
                        ip: ip.to_string(),
                        user_agent: Some(GOOD_USER_AGENTS[0].to_string()),
                        ..Default::default()
                    },
                )
                .await
                .expect("register doesn't error");

            assert!(result.is_some());
        }

        assert_eq!(listens.count_for(asset.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_source_resolution() {
        let harness = test_harness("listens_source").await;
        let listens = Listens::new(&harness.context);

        let user = create_user(&harness.context.database, "sudara").await;
        let asset = create_asset(&harness.context.database, &user, "Song 1").await;

        // Override beats referrer
        let listen = listens
            .register(
                &asset,
                ListenRequest {
                    ip: "10.0.0.1".to_string(),
                    user_agent: Some("iTunes/x.x.x".to_string()),
                    referrer: Some("https://opentone.example/blah".to_string()),
                    source_override: Some("itunes".to_string()),
                    listener_id: None,
                },
            )
            .await
            .unwrap()
            .expect("listen is created");

        assert_eq!(listen.source, "itunes");

        // Referrer when no override
        let listen = listens
            .register(
                &asset,
                ListenRequest {
                    ip: "10.0.0.2".to_string(),
                    user_agent: Some("iTunes/x.x.x".to_string()),
                    referrer: Some("https://opentone.example/blah".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .expect("listen is created");

        assert_eq!(listen.source, "https://opentone.example/blah");

        // Neither
        let listen = listens
            .register(
                &asset,
                ListenRequest {
                    ip: "10.0.0.3".to_string(),
                    user_agent: Some("iTunes/x.x.x".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .expect("listen is created");

        assert_eq!(listen.source, "direct hit");
    }
}
