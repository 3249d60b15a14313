//! Contract ABI for the Dutch auction.

use alloy::sol;

sol! {
    /// Read/write surface of the deployed auction contract.
    ///
    /// `getAuctionInfo` reports `remainingTokens` in base units but
    /// `soldTokens` as a whole-token count. `startTime` and `endTime` are not
    /// used by the client.
    #[sol(rpc)]
    interface IDutchAuction {
        function getAuctionInfo() external view returns (
            bool started,
            bool cancelled,
            bool active,
            uint256 startTime,
            uint256 remainingTokens,
            uint256 soldTokens,
            uint256 endTime,
            uint256 totalBuyers,
            uint256 timeRemaining
        );
        function getCurrentPrice() external view returns (uint256);
        function paused() external view returns (bool);
        function getPurchaseInfo(address buyer) external view returns (
            uint256 tokensPurchased,
            uint256 totalPaid,
            uint256 remainingAllowance
        );

        function maxTokensPerAddress() external view returns (uint256);
        function minBidIncrement() external view returns (uint256);
        function reservePrice() external view returns (uint256);
        function startingPrice() external view returns (uint256);
        function totalTokenAmount() external view returns (uint256);

        function buyTokens(uint256 tokenAmount) external payable;
    }
}
